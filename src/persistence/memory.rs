//! In-memory implementation of the persistence traits.
//!
//! Each table lives behind its own [`tokio::sync::Mutex`]; every trait
//! method takes the lock once, so the check and the write of a conditional
//! operation can never interleave with another caller. Used when
//! persistence is disabled and throughout the test suite.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{BalanceLedger, BoostStat, RecordStore, StoreError, ensure_positive};
use crate::domain::{
    BalanceType, Balances, BoostId, BoostRecord, BoostStatus, EngagementAction, EngagementEvent,
    PlanTier, PublishResult, RewardLedger, SubscriptionAccount,
};

#[derive(Debug)]
struct StoredBoost {
    record: BoostRecord,
    claimed: bool,
}

#[derive(Debug, Default)]
struct RewardTables {
    ledgers: HashMap<String, RewardLedger>,
    engagements: HashSet<(String, String, EngagementAction)>,
}

impl RewardTables {
    fn ledger_mut(&mut self, email: &str) -> &mut RewardLedger {
        self.ledgers
            .entry(email.to_string())
            .or_insert_with(|| RewardLedger {
                email: email.to_string(),
                point_balance: 0,
                lifetime_points: 0,
                social_identity: None,
            })
    }
}

/// Process-local store implementing [`RecordStore`] and [`BalanceLedger`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    boosts: Mutex<HashMap<BoostId, StoredBoost>>,
    subscriptions: Mutex<HashMap<String, SubscriptionAccount>>,
    rewards: Mutex<RewardTables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of boost records held.
    pub async fn boost_count(&self) -> usize {
        self.boosts.lock().await.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, record: BoostRecord) -> Result<BoostRecord, StoreError> {
        let mut boosts = self.boosts.lock().await;
        let stored = boosts
            .entry(record.id.clone())
            .or_insert_with(|| StoredBoost {
                record,
                claimed: false,
            });
        Ok(stored.record.clone())
    }

    async fn get(&self, id: &BoostId) -> Result<Option<BoostRecord>, StoreError> {
        Ok(self.boosts.lock().await.get(id).map(|s| s.record.clone()))
    }

    async fn claim(&self, id: &BoostId) -> Result<bool, StoreError> {
        let mut boosts = self.boosts.lock().await;
        let Some(stored) = boosts.get_mut(id) else {
            return Ok(false);
        };
        if stored.claimed || stored.record.is_terminal() {
            return Ok(false);
        }
        stored.claimed = true;
        Ok(true)
    }

    async fn update_to_published(
        &self,
        id: &BoostId,
        result: &PublishResult,
    ) -> Result<bool, StoreError> {
        let mut boosts = self.boosts.lock().await;
        let Some(stored) = boosts.get_mut(id) else {
            return Ok(false);
        };
        if stored.record.is_terminal() {
            return Ok(false);
        }
        stored.record.status = BoostStatus::Published;
        stored.record.result = Some(result.clone());
        stored.record.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_to_failed(&self, id: &BoostId, error: &str) -> Result<bool, StoreError> {
        let mut boosts = self.boosts.lock().await;
        let Some(stored) = boosts.get_mut(id) else {
            return Ok(false);
        };
        if stored.record.is_terminal() {
            return Ok(false);
        }
        stored.record.status = BoostStatus::Failed;
        stored.record.error = Some(error.to_string());
        stored.record.updated_at = Utc::now();
        Ok(true)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<Vec<BoostStat>, StoreError> {
        let boosts = self.boosts.lock().await;
        let mut buckets: HashMap<(_, _), i64> = HashMap::new();
        for stored in boosts.values().filter(|s| s.record.created_at >= since) {
            *buckets
                .entry((stored.record.origin, stored.record.status))
                .or_default() += 1;
        }
        let mut stats: Vec<BoostStat> = buckets
            .into_iter()
            .map(|((origin, status), count)| BoostStat {
                origin,
                status,
                count,
            })
            .collect();
        stats.sort_by(|a, b| {
            (a.origin.as_str(), a.status.as_str()).cmp(&(b.origin.as_str(), b.status.as_str()))
        });
        Ok(stats)
    }
}

#[async_trait]
impl BalanceLedger for MemoryStore {
    async fn provision_subscription(
        &self,
        email: &str,
        plan: PlanTier,
        subscription_ref: Option<&str>,
    ) -> Result<SubscriptionAccount, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let previous_ref = subscriptions
            .get(email)
            .and_then(|a| a.subscription_ref.clone());
        let account = SubscriptionAccount {
            email: email.to_string(),
            plan,
            credit_balance: plan.allotment(),
            subscription_ref: subscription_ref.map(str::to_string).or(previous_ref),
            billing_anchor: Utc::now(),
        };
        subscriptions.insert(email.to_string(), account.clone());
        Ok(account)
    }

    async fn reset_credits(&self, email: &str) -> Result<SubscriptionAccount, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let account = subscriptions
            .get_mut(email)
            .ok_or_else(|| StoreError::NotFound(email.to_string()))?;
        account.credit_balance = account.plan.allotment();
        account.billing_anchor = Utc::now();
        Ok(account.clone())
    }

    async fn grant(
        &self,
        balance: BalanceType,
        email: &str,
        amount: i64,
    ) -> Result<i64, StoreError> {
        ensure_positive(amount)?;
        match balance {
            BalanceType::Credits => {
                let mut subscriptions = self.subscriptions.lock().await;
                let account = subscriptions
                    .get_mut(email)
                    .ok_or_else(|| StoreError::NotFound(email.to_string()))?;
                account.credit_balance = account.credit_balance.saturating_add(amount);
                Ok(account.credit_balance)
            }
            BalanceType::Points => {
                let mut rewards = self.rewards.lock().await;
                let ledger = rewards.ledger_mut(email);
                ledger.point_balance = ledger.point_balance.saturating_add(amount);
                ledger.lifetime_points = ledger.lifetime_points.saturating_add(amount);
                Ok(ledger.point_balance)
            }
        }
    }

    async fn debit(
        &self,
        balance: BalanceType,
        email: &str,
        amount: i64,
    ) -> Result<Option<i64>, StoreError> {
        ensure_positive(amount)?;
        match balance {
            BalanceType::Credits => {
                let mut subscriptions = self.subscriptions.lock().await;
                Ok(subscriptions
                    .get_mut(email)
                    .filter(|a| a.credit_balance >= amount)
                    .map(|a| {
                        a.credit_balance -= amount;
                        a.credit_balance
                    }))
            }
            BalanceType::Points => {
                let mut rewards = self.rewards.lock().await;
                Ok(rewards
                    .ledgers
                    .get_mut(email)
                    .filter(|l| l.point_balance >= amount)
                    .map(|l| {
                        l.point_balance -= amount;
                        l.point_balance
                    }))
            }
        }
    }

    async fn record_engagement(&self, event: &EngagementEvent) -> Result<bool, StoreError> {
        ensure_positive(event.points)?;
        let mut rewards = self.rewards.lock().await;
        let key = (event.email.clone(), event.post_id.clone(), event.action);
        if !rewards.engagements.insert(key) {
            return Ok(false);
        }
        let ledger = rewards.ledger_mut(&event.email);
        ledger.point_balance = ledger.point_balance.saturating_add(event.points);
        ledger.lifetime_points = ledger.lifetime_points.saturating_add(event.points);
        Ok(true)
    }

    async fn link_social_identity(
        &self,
        email: &str,
        handle: &str,
    ) -> Result<RewardLedger, StoreError> {
        let mut rewards = self.rewards.lock().await;
        let ledger = rewards.ledger_mut(email);
        ledger.social_identity = Some(handle.to_string());
        Ok(ledger.clone())
    }

    async fn balances(&self, email: &str) -> Result<Balances, StoreError> {
        let subscription = self.subscriptions.lock().await.get(email).cloned();
        let rewards = self.rewards.lock().await.ledgers.get(email).cloned();
        Ok(Balances {
            subscription,
            rewards,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::BoostOrigin;
    use crate::domain::boost_record::fixtures;

    const EMAIL: &str = "alice@example.com";

    fn pending(id: &str) -> BoostRecord {
        BoostRecord::new(BoostId::from(id), BoostOrigin::Paid, None, fixtures::payload())
    }

    fn published_result() -> PublishResult {
        PublishResult {
            post_id: "1800".to_string(),
            post_url: "https://x.com/main/status/1800".to_string(),
            published_at: Utc::now(),
            account_id: "main".to_string(),
        }
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = MemoryStore::new();
        let first = store.create(pending("tx_1")).await;
        let mut other = pending("tx_1");
        other.payload.text = "different text".to_string();
        let second = store.create(other).await;

        let (Ok(first), Ok(second)) = (first, second) else {
            panic!("create failed");
        };
        assert_eq!(first, second);
        assert_eq!(second.payload.text, fixtures::payload().text);
        assert_eq!(store.boost_count().await, 1);
    }

    #[tokio::test]
    async fn terminal_record_is_never_overwritten() {
        let store = MemoryStore::new();
        let id = BoostId::from("tx_1");
        let _ = store.create(pending("tx_1")).await;

        assert!(matches!(store.update_to_published(&id, &published_result()).await, Ok(true)));
        assert!(matches!(store.update_to_failed(&id, "late failure").await, Ok(false)));

        let Ok(Some(record)) = store.get(&id).await else {
            panic!("record missing");
        };
        assert_eq!(record.status, BoostStatus::Published);
        assert!(record.error.is_none());
        assert_eq!(record.result.map(|r| r.post_id).as_deref(), Some("1800"));
    }

    #[tokio::test]
    async fn claim_succeeds_once_and_never_after_terminal() {
        let store = MemoryStore::new();
        let id = BoostId::from("tx_1");
        let _ = store.create(pending("tx_1")).await;

        assert!(matches!(store.claim(&id).await, Ok(true)));
        assert!(matches!(store.claim(&id).await, Ok(false)));
        assert!(matches!(store.claim(&BoostId::from("missing")).await, Ok(false)));
    }

    #[tokio::test]
    async fn concurrent_debits_never_go_negative() {
        const N: i64 = 12;
        let store = Arc::new(MemoryStore::new());
        let _ = store
            .provision_subscription(EMAIL, PlanTier::Growth, Some("sub_1"))
            .await;

        let mut handles = Vec::new();
        for _ in 0..N + 5 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.debit(BalanceType::Credits, EMAIL, 1).await
            }));
        }

        let mut successes = 0;
        let mut refusals = 0;
        for handle in handles {
            match handle.await {
                Ok(Ok(Some(_))) => successes += 1,
                Ok(Ok(None)) => refusals += 1,
                other => panic!("unexpected debit outcome: {other:?}"),
            }
        }
        assert_eq!(successes, N);
        assert_eq!(refusals, 5);

        let Ok(balances) = store.balances(EMAIL).await else {
            panic!("balances failed");
        };
        assert_eq!(balances.subscription.map(|s| s.credit_balance), Some(0));
    }

    #[tokio::test]
    async fn debit_of_missing_account_is_refused() {
        let store = MemoryStore::new();
        let result = store.debit(BalanceType::Points, EMAIL, 1).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn debit_rejects_non_positive_amount() {
        let store = MemoryStore::new();
        let result = store.debit(BalanceType::Credits, EMAIL, 0).await;
        assert!(matches!(result, Err(StoreError::InvalidAmount(0))));
    }

    #[tokio::test]
    async fn engagement_is_credited_once() {
        let store = MemoryStore::new();
        let event = EngagementEvent {
            email: EMAIL.to_string(),
            post_id: "1800".to_string(),
            action: EngagementAction::Like,
            points: 5,
            recorded_at: Utc::now(),
        };

        assert!(matches!(store.record_engagement(&event).await, Ok(true)));
        assert!(matches!(store.record_engagement(&event).await, Ok(false)));

        let retweet = EngagementEvent {
            action: EngagementAction::Retweet,
            ..event.clone()
        };
        assert!(matches!(store.record_engagement(&retweet).await, Ok(true)));

        let Ok(Balances {
            rewards: Some(ledger),
            ..
        }) = store.balances(EMAIL).await
        else {
            panic!("ledger missing");
        };
        assert_eq!(ledger.point_balance, 10);
        assert_eq!(ledger.lifetime_points, 10);
    }

    #[tokio::test]
    async fn points_debit_keeps_lifetime_total() {
        let store = MemoryStore::new();
        let _ = store.grant(BalanceType::Points, EMAIL, 30).await;

        assert!(matches!(store.debit(BalanceType::Points, EMAIL, 25).await, Ok(Some(5))));
        assert!(matches!(store.debit(BalanceType::Points, EMAIL, 25).await, Ok(None)));

        let Ok(Balances {
            rewards: Some(ledger),
            ..
        }) = store.balances(EMAIL).await
        else {
            panic!("ledger missing");
        };
        assert_eq!(ledger.point_balance, 5);
        assert_eq!(ledger.lifetime_points, 30);
    }

    #[tokio::test]
    async fn renewal_resets_to_allotment() {
        let store = MemoryStore::new();
        let _ = store
            .provision_subscription(EMAIL, PlanTier::Starter, Some("sub_1"))
            .await;
        let _ = store.debit(BalanceType::Credits, EMAIL, 3).await;

        let Ok(account) = store.reset_credits(EMAIL).await else {
            panic!("reset failed");
        };
        assert_eq!(account.credit_balance, PlanTier::Starter.allotment());
        assert_eq!(account.subscription_ref.as_deref(), Some("sub_1"));

        let missing = store.reset_credits("bob@example.com").await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn granting_credits_requires_subscription() {
        let store = MemoryStore::new();
        let result = store.grant(BalanceType::Credits, EMAIL, 1).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn stats_group_by_origin_and_status() {
        let store = MemoryStore::new();
        let since = Utc::now() - chrono::Duration::hours(1);
        let _ = store.create(pending("tx_1")).await;
        let _ = store.create(pending("tx_2")).await;
        let _ = store.update_to_failed(&BoostId::from("tx_2"), "boom").await;

        let Ok(stats) = store.stats(since).await else {
            panic!("stats failed");
        };
        assert_eq!(
            stats,
            vec![
                BoostStat {
                    origin: BoostOrigin::Paid,
                    status: BoostStatus::Failed,
                    count: 1,
                },
                BoostStat {
                    origin: BoostOrigin::Paid,
                    status: BoostStatus::Pending,
                    count: 1,
                },
            ]
        );
    }
}
