//! Persistence layer: boost records and balance ledgers.
//!
//! Two traits describe the only shared mutable state in the service:
//! [`RecordStore`] for boost records and [`BalanceLedger`] for subscription
//! credits and reward points. Every race-sensitive transition (idempotent
//! create, claim, conditional terminal update, conditional debit,
//! unique engagement insert) is a single atomic operation of the store, so
//! callers never read-then-write.
//!
//! [`postgres`] backs both traits with `sqlx::PgPool`; [`memory`] provides
//! the same semantics in process memory for local runs and tests.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BalanceType, Balances, BoostId, BoostRecord, EngagementEvent, PlanTier, PublishResult,
    RewardLedger, SubscriptionAccount,
};

pub use memory::MemoryStore;
pub use models::BoostStat;
pub use postgres::PostgresStore;

/// Errors reported by the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database failed.
    #[error("database error: {0}")]
    Database(String),

    /// The referenced account does not exist.
    #[error("account not found: {0}")]
    NotFound(String),

    /// Grants and debits must move at least one unit.
    #[error("invalid amount: {0}")]
    InvalidAmount(i64),

    /// A stored row could not be mapped back into the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Rejects non-positive grant and debit amounts.
pub(crate) fn ensure_positive(amount: i64) -> Result<(), StoreError> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount(amount));
    }
    Ok(())
}

/// Durable store of [`BoostRecord`]s.
///
/// Only the lifecycle orchestrator mutates records, and each record reaches
/// a terminal state at most once.
#[async_trait]
pub trait RecordStore: Send + Sync + fmt::Debug {
    /// Inserts a `Pending` record, or returns the existing record with the
    /// same id unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn create(&self, record: BoostRecord) -> Result<BoostRecord, StoreError>;

    /// Fetches a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn get(&self, id: &BoostId) -> Result<Option<BoostRecord>, StoreError>;

    /// Marks a `Pending` record as being published by the caller.
    ///
    /// Returns `false` if the record is missing, terminal, or already
    /// claimed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn claim(&self, id: &BoostId) -> Result<bool, StoreError>;

    /// Moves a `Pending` record to `Published`.
    ///
    /// Returns `false` without writing if the record is not `Pending`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn update_to_published(
        &self,
        id: &BoostId,
        result: &PublishResult,
    ) -> Result<bool, StoreError>;

    /// Moves a `Pending` record to `Failed`.
    ///
    /// Returns `false` without writing if the record is not `Pending`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn update_to_failed(&self, id: &BoostId, error: &str) -> Result<bool, StoreError>;

    /// Counts records created at or after `since`, grouped by origin and
    /// status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn stats(&self, since: DateTime<Utc>) -> Result<Vec<BoostStat>, StoreError>;
}

/// Subscription credit and reward point balances.
///
/// Emails passed in are expected to be normalized already.
#[async_trait]
pub trait BalanceLedger: Send + Sync + fmt::Debug {
    /// Creates or replaces a subscription and sets its balance to the plan
    /// allotment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn provision_subscription(
        &self,
        email: &str,
        plan: PlanTier,
        subscription_ref: Option<&str>,
    ) -> Result<SubscriptionAccount, StoreError>;

    /// Renewal: resets the credit balance to the plan allotment and moves
    /// the billing anchor to now.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no subscription exists.
    async fn reset_credits(&self, email: &str) -> Result<SubscriptionAccount, StoreError>;

    /// Unconditionally increases a balance and returns the new value.
    ///
    /// Granting points creates the reward ledger on first use; granting
    /// credits requires an existing subscription.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAmount`] for non-positive amounts and
    /// [`StoreError::NotFound`] when crediting a missing subscription.
    async fn grant(
        &self,
        balance: BalanceType,
        email: &str,
        amount: i64,
    ) -> Result<i64, StoreError>;

    /// Decreases a balance only if it covers `amount`, atomically.
    ///
    /// Returns the new balance, or `None` when funds are insufficient or
    /// the account does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAmount`] for non-positive amounts.
    async fn debit(
        &self,
        balance: BalanceType,
        email: &str,
        amount: i64,
    ) -> Result<Option<i64>, StoreError>;

    /// Inserts the engagement and credits its points in one step.
    ///
    /// Returns `false`, crediting nothing, if the
    /// `(email, post_id, action)` triple was already recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidAmount`] for non-positive points.
    async fn record_engagement(&self, event: &EngagementEvent) -> Result<bool, StoreError>;

    /// Attaches a social handle to the reward ledger, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn link_social_identity(
        &self,
        email: &str,
        handle: &str,
    ) -> Result<RewardLedger, StoreError>;

    /// Reads both balances for a customer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on backend failure.
    async fn balances(&self, email: &str) -> Result<Balances, StoreError>;
}
