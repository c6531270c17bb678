//! Domain layer: boost records, balances, and text rendering.
//!
//! This module holds the server-side domain model: boost identity and
//! lifecycle, the two consumable balance types with their engagement
//! ledger, and placeholder substitution for post text.

pub mod balance;
pub mod boost_id;
pub mod boost_record;
pub mod placeholder;

pub use balance::{
    BalanceType, Balances, EngagementAction, EngagementEvent, PlanTier, RewardLedger,
    SubscriptionAccount, normalize_email,
};
pub use boost_id::BoostId;
pub use boost_record::{
    BoostOrigin, BoostPayload, BoostRecord, BoostStatus, ContentDescriptor, ProductDescriptor,
    PublishResult,
};
