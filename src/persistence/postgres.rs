//! PostgreSQL implementation of the persistence layer.
//!
//! Conditional operations are single statements: the `WHERE` clause carries
//! the guard and `RETURNING` / `rows_affected` reports whether it held.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use super::models::{BoostRow, RewardRow, SubscriptionRow};
use super::{BalanceLedger, BoostStat, RecordStore, StoreError, ensure_positive};
use crate::config::GatewayConfig;
use crate::domain::{
    BalanceType, Balances, BoostId, BoostRecord, EngagementEvent, PlanTier, PublishResult,
    RewardLedger, SubscriptionAccount,
};

const BOOST_COLUMNS: &str = "id, status, origin, customer_email, payload, post_id, post_url, \
     published_at, account_id, error, created_at, updated_at";

const SUBSCRIPTION_COLUMNS: &str = "email, plan, credit_balance, subscription_ref, billing_anchor";

const REWARD_COLUMNS: &str = "email, point_balance, lifetime_points, social_identity";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from the gateway configuration and applies
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable or a
    /// migration fails.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::info!("database migrations applied");
        Ok(Self::new(pool))
    }

    async fn fetch_subscription(
        &self,
        email: &str,
    ) -> Result<Option<SubscriptionAccount>, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscription_accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SubscriptionAccount::try_from).transpose()
    }

    async fn fetch_rewards(&self, email: &str) -> Result<Option<RewardLedger>, StoreError> {
        let row = sqlx::query_as::<_, RewardRow>(&format!(
            "SELECT {REWARD_COLUMNS} FROM reward_ledgers WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(RewardLedger::from))
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn create(&self, record: BoostRecord) -> Result<BoostRecord, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO boosts (id, status, origin, customer_email, payload, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) ON CONFLICT (id) DO NOTHING",
        )
        .bind(record.id.as_str())
        .bind(record.status.as_str())
        .bind(record.origin.as_str())
        .bind(record.customer_email.as_deref())
        .bind(Json(&record.payload))
        .bind(record.created_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 1 {
            return Ok(record);
        }
        tracing::debug!(boost_id = %record.id, "boost already exists, returning stored record");
        self.get(&record.id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("boost {} vanished after conflict", record.id)))
    }

    async fn get(&self, id: &BoostId) -> Result<Option<BoostRecord>, StoreError> {
        let row = sqlx::query_as::<_, BoostRow>(&format!(
            "SELECT {BOOST_COLUMNS} FROM boosts WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(BoostRecord::try_from).transpose()
    }

    async fn claim(&self, id: &BoostId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE boosts SET claimed_at = now() \
             WHERE id = $1 AND status = 'pending' AND claimed_at IS NULL",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_to_published(
        &self,
        id: &BoostId,
        result: &PublishResult,
    ) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            "UPDATE boosts SET status = 'published', post_id = $2, post_url = $3, \
             published_at = $4, account_id = $5, updated_at = now() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.as_str())
        .bind(&result.post_id)
        .bind(&result.post_url)
        .bind(result.published_at)
        .bind(&result.account_id)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() == 1)
    }

    async fn update_to_failed(&self, id: &BoostId, error: &str) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            "UPDATE boosts SET status = 'failed', error = $2, updated_at = now() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() == 1)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<Vec<BoostStat>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT origin, status, COUNT(*) FROM boosts WHERE created_at >= $1 \
             GROUP BY origin, status ORDER BY origin, status",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(origin, status, count)| {
                Ok(BoostStat {
                    origin: origin.parse().map_err(StoreError::Corrupt)?,
                    status: status.parse().map_err(StoreError::Corrupt)?,
                    count,
                })
            })
            .collect()
    }
}

#[async_trait]
impl BalanceLedger for PostgresStore {
    async fn provision_subscription(
        &self,
        email: &str,
        plan: PlanTier,
        subscription_ref: Option<&str>,
    ) -> Result<SubscriptionAccount, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "INSERT INTO subscription_accounts (email, plan, credit_balance, subscription_ref, billing_anchor) \
             VALUES ($1, $2, $3, $4, now()) \
             ON CONFLICT (email) DO UPDATE SET plan = EXCLUDED.plan, \
             credit_balance = EXCLUDED.credit_balance, \
             subscription_ref = COALESCE(EXCLUDED.subscription_ref, subscription_accounts.subscription_ref), \
             billing_anchor = EXCLUDED.billing_anchor \
             RETURNING {SUBSCRIPTION_COLUMNS}"
        ))
        .bind(email)
        .bind(plan.as_str())
        .bind(plan.allotment())
        .bind(subscription_ref)
        .fetch_one(&self.pool)
        .await?;
        SubscriptionAccount::try_from(row)
    }

    async fn reset_credits(&self, email: &str) -> Result<SubscriptionAccount, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&reset_credits_sql())
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(email.to_string()))?;
        SubscriptionAccount::try_from(row)
    }

    async fn grant(
        &self,
        balance: BalanceType,
        email: &str,
        amount: i64,
    ) -> Result<i64, StoreError> {
        ensure_positive(amount)?;
        let new_balance = match balance {
            BalanceType::Credits => sqlx::query_scalar::<_, i64>(
                "UPDATE subscription_accounts SET credit_balance = credit_balance + $2 \
                 WHERE email = $1 RETURNING credit_balance",
            )
            .bind(email)
            .bind(amount)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(email.to_string()))?,
            BalanceType::Points => sqlx::query_scalar::<_, i64>(
                "INSERT INTO reward_ledgers (email, point_balance, lifetime_points) VALUES ($1, $2, $2) \
                 ON CONFLICT (email) DO UPDATE SET \
                 point_balance = reward_ledgers.point_balance + EXCLUDED.point_balance, \
                 lifetime_points = reward_ledgers.lifetime_points + EXCLUDED.lifetime_points \
                 RETURNING point_balance",
            )
            .bind(email)
            .bind(amount)
            .fetch_one(&self.pool)
            .await?,
        };
        Ok(new_balance)
    }

    async fn debit(
        &self,
        balance: BalanceType,
        email: &str,
        amount: i64,
    ) -> Result<Option<i64>, StoreError> {
        ensure_positive(amount)?;
        let sql = match balance {
            BalanceType::Credits => {
                "UPDATE subscription_accounts SET credit_balance = credit_balance - $2 \
                 WHERE email = $1 AND credit_balance >= $2 RETURNING credit_balance"
            }
            BalanceType::Points => {
                "UPDATE reward_ledgers SET point_balance = point_balance - $2 \
                 WHERE email = $1 AND point_balance >= $2 RETURNING point_balance"
            }
        };
        let new_balance = sqlx::query_scalar::<_, i64>(sql)
            .bind(email)
            .bind(amount)
            .fetch_optional(&self.pool)
            .await?;
        Ok(new_balance)
    }

    async fn record_engagement(&self, event: &EngagementEvent) -> Result<bool, StoreError> {
        ensure_positive(event.points)?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO engagement_events (email, post_id, action, points, recorded_at) \
             VALUES ($1, $2, $3, $4, $5) ON CONFLICT (email, post_id, action) DO NOTHING",
        )
        .bind(&event.email)
        .bind(&event.post_id)
        .bind(event.action.as_str())
        .bind(event.points)
        .bind(event.recorded_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO reward_ledgers (email, point_balance, lifetime_points) VALUES ($1, $2, $2) \
             ON CONFLICT (email) DO UPDATE SET \
             point_balance = reward_ledgers.point_balance + EXCLUDED.point_balance, \
             lifetime_points = reward_ledgers.lifetime_points + EXCLUDED.lifetime_points",
        )
        .bind(&event.email)
        .bind(event.points)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn link_social_identity(
        &self,
        email: &str,
        handle: &str,
    ) -> Result<RewardLedger, StoreError> {
        let row = sqlx::query_as::<_, RewardRow>(&format!(
            "INSERT INTO reward_ledgers (email, social_identity) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE SET social_identity = EXCLUDED.social_identity \
             RETURNING {REWARD_COLUMNS}"
        ))
        .bind(email)
        .bind(handle)
        .fetch_one(&self.pool)
        .await?;
        Ok(RewardLedger::from(row))
    }

    async fn balances(&self, email: &str) -> Result<Balances, StoreError> {
        Ok(Balances {
            subscription: self.fetch_subscription(email).await?,
            rewards: self.fetch_rewards(email).await?,
        })
    }
}

/// One `UPDATE` that resets credits to the stored plan's allotment.
fn reset_credits_sql() -> String {
    let arms: String = PlanTier::ALL
        .iter()
        .map(|plan| format!("WHEN '{}' THEN {} ", plan.as_str(), plan.allotment()))
        .collect();
    format!(
        "UPDATE subscription_accounts \
         SET credit_balance = CASE plan {arms}ELSE credit_balance END, billing_anchor = now() \
         WHERE email = $1 RETURNING {SUBSCRIPTION_COLUMNS}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_is_a_single_statement_covering_every_plan() {
        let sql = reset_credits_sql();
        assert!(sql.starts_with("UPDATE subscription_accounts"));
        assert!(!sql.contains("SELECT"));
        assert_eq!(sql.matches(';').count(), 0);
        for plan in PlanTier::ALL {
            let arm = format!("WHEN '{}' THEN {} ", plan.as_str(), plan.allotment());
            assert!(sql.contains(&arm), "missing {arm}");
        }
        assert!(sql.contains("ELSE credit_balance END"));
    }
}
