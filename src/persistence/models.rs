//! Database row models and their mapping into the domain.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use utoipa::ToSchema;

use super::StoreError;
use crate::domain::{
    BoostOrigin, BoostPayload, BoostRecord, BoostStatus, PublishResult, RewardLedger,
    SubscriptionAccount,
};

/// A row from the `boosts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BoostRow {
    /// Transaction id.
    pub id: String,
    /// `pending`, `published` or `failed`.
    pub status: String,
    /// `paid`, `subscription`, `reward` or `internal`.
    pub origin: String,
    /// Customer to notify.
    pub customer_email: Option<String>,
    /// JSONB payload.
    pub payload: Json<BoostPayload>,
    /// Platform post id.
    pub post_id: Option<String>,
    /// Platform post URL.
    pub post_url: Option<String>,
    /// Publish time.
    pub published_at: Option<DateTime<Utc>>,
    /// Publishing account.
    pub account_id: Option<String>,
    /// Failure reason.
    pub error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BoostRow> for BoostRecord {
    type Error = StoreError;

    fn try_from(row: BoostRow) -> Result<Self, Self::Error> {
        let status: BoostStatus = row.status.parse().map_err(StoreError::Corrupt)?;
        let origin: BoostOrigin = row.origin.parse().map_err(StoreError::Corrupt)?;

        let result = match (row.post_id, row.post_url, row.published_at, row.account_id) {
            (Some(post_id), Some(post_url), Some(published_at), Some(account_id)) => {
                Some(PublishResult {
                    post_id,
                    post_url,
                    published_at,
                    account_id,
                })
            }
            _ => None,
        };
        if status == BoostStatus::Published && result.is_none() {
            return Err(StoreError::Corrupt(format!(
                "boost {} is published without result fields",
                row.id
            )));
        }

        Ok(Self {
            id: row.id.into(),
            status,
            origin,
            customer_email: row.customer_email,
            payload: row.payload.0,
            result,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `subscription_accounts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    /// Normalized email.
    pub email: String,
    /// Plan tier string.
    pub plan: String,
    /// Remaining credits.
    pub credit_balance: i64,
    /// Provider subscription reference.
    pub subscription_ref: Option<String>,
    /// Billing anchor.
    pub billing_anchor: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for SubscriptionAccount {
    type Error = StoreError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let plan = row
            .plan
            .parse()
            .map_err(|_| StoreError::Corrupt(format!("unknown plan {:?}", row.plan)))?;
        Ok(Self {
            email: row.email,
            plan,
            credit_balance: row.credit_balance,
            subscription_ref: row.subscription_ref,
            billing_anchor: row.billing_anchor,
        })
    }
}

/// A row from the `reward_ledgers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RewardRow {
    /// Normalized email.
    pub email: String,
    /// Spendable points.
    pub point_balance: i64,
    /// Lifetime points.
    pub lifetime_points: i64,
    /// Linked social handle.
    pub social_identity: Option<String>,
}

impl From<RewardRow> for RewardLedger {
    fn from(row: RewardRow) -> Self {
        Self {
            email: row.email,
            point_balance: row.point_balance,
            lifetime_points: row.lifetime_points,
            social_identity: row.social_identity,
        }
    }
}

/// One bucket of the derived boost statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BoostStat {
    /// Funding source.
    pub origin: BoostOrigin,
    /// Lifecycle status.
    pub status: BoostStatus,
    /// Number of records in the bucket.
    pub count: i64,
}
