//! Balance and reward DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{BalanceType, Balances, EngagementAction, RewardLedger, SubscriptionAccount};
use crate::service::EngagementReceipt;

/// Response body for `GET /balances/{email}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalancesResponse {
    /// Normalized email the balances belong to.
    pub email: String,
    /// Subscription and its credits.
    pub subscription: Option<SubscriptionAccount>,
    /// Reward ledger and its points.
    pub rewards: Option<RewardLedger>,
}

impl BalancesResponse {
    /// Wraps a balance projection.
    #[must_use]
    pub fn new(email: String, balances: Balances) -> Self {
        Self {
            email,
            subscription: balances.subscription,
            rewards: balances.rewards,
        }
    }
}

/// Request body for `POST /balances/{email}/grant`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantRequest {
    /// `credits` or `points`.
    pub balance_type: String,
    /// Units to add; must be positive.
    pub amount: i64,
}

/// Response body for a balance grant.
#[derive(Debug, Serialize, ToSchema)]
pub struct GrantResponse {
    /// Normalized customer email.
    pub email: String,
    /// Balance that was increased.
    pub balance_type: BalanceType,
    /// New balance.
    pub balance: i64,
}

/// Request body for `POST /rewards/engagements`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EngagementRequest {
    /// Customer who engaged.
    pub email: String,
    /// Post they engaged with.
    pub post_id: String,
    /// What they did.
    pub action: EngagementAction,
}

/// Response body for a recorded engagement.
#[derive(Debug, Serialize, ToSchema)]
pub struct EngagementResponse {
    /// `false` if this engagement was already credited.
    pub credited: bool,
    /// Points the action is worth.
    pub points: i64,
    /// Point balance after the call.
    pub point_balance: i64,
}

impl From<EngagementReceipt> for EngagementResponse {
    fn from(receipt: EngagementReceipt) -> Self {
        Self {
            credited: receipt.credited,
            points: receipt.points,
            point_balance: receipt.point_balance,
        }
    }
}

/// Request body for `POST /rewards/link`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LinkIdentityRequest {
    /// Customer email.
    pub email: String,
    /// Social handle, with or without a leading `@`.
    pub handle: String,
}
