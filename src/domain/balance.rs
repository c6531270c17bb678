//! Consumable balances: subscription credits and reward points.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// Which balance funds a redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BalanceType {
    /// Subscription credits, one per boost.
    Credits,
    /// Reward points, redeemed in bulk.
    Points,
}

impl FromStr for BalanceType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credits" | "credit" | "subscription" => Ok(Self::Credits),
            "points" | "point" | "rewards" | "reward" => Ok(Self::Points),
            other => Err(GatewayError::InvalidBalanceType(other.to_string())),
        }
    }
}

/// Subscription plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Entry plan.
    Starter,
    /// Mid plan.
    Growth,
    /// Top plan.
    Pro,
}

impl PlanTier {
    /// Every tier, cheapest first.
    pub const ALL: [Self; 3] = [Self::Starter, Self::Growth, Self::Pro];

    /// Credits granted at the start of each billing cycle.
    #[must_use]
    pub const fn allotment(self) -> i64 {
        match self {
            Self::Starter => 4,
            Self::Growth => 12,
            Self::Pro => 30,
        }
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Starter => "starter",
            Self::Growth => "growth",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "growth" => Ok(Self::Growth),
            "pro" => Ok(Self::Pro),
            other => Err(GatewayError::InvalidRequest(format!("unknown plan: {other}"))),
        }
    }
}

/// A customer's subscription and its credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionAccount {
    /// Normalized customer email.
    pub email: String,
    /// Current plan.
    pub plan: PlanTier,
    /// Remaining credits. Never negative.
    pub credit_balance: i64,
    /// Payment-provider subscription reference.
    pub subscription_ref: Option<String>,
    /// Start of the current billing cycle.
    pub billing_anchor: DateTime<Utc>,
}

/// A customer's reward points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RewardLedger {
    /// Normalized customer email.
    pub email: String,
    /// Spendable points. Never negative.
    pub point_balance: i64,
    /// Every point ever earned. Never decreases.
    pub lifetime_points: i64,
    /// Linked social handle, if any.
    pub social_identity: Option<String>,
}

/// An engagement that earns reward points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EngagementAction {
    /// Liked one of our posts.
    Like,
    /// Retweeted one of our posts.
    Retweet,
    /// Replied to one of our posts.
    Reply,
    /// Followed one of our accounts.
    Follow,
}

impl EngagementAction {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Retweet => "retweet",
            Self::Reply => "reply",
            Self::Follow => "follow",
        }
    }
}

impl fmt::Display for EngagementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only ledger row. `(email, post_id, action)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementEvent {
    /// Normalized customer email.
    pub email: String,
    /// Platform post the engagement targeted.
    pub post_id: String,
    /// What the customer did.
    pub action: EngagementAction,
    /// Points credited.
    pub points: i64,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Read projection of both balances for one customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Balances {
    /// Subscription, if the customer has one.
    pub subscription: Option<SubscriptionAccount>,
    /// Reward ledger, if the customer has one.
    pub rewards: Option<RewardLedger>,
}

/// Normalizes a customer email to its primary-key form.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the value is blank or has no
/// `@`.
pub fn normalize_email(email: &str) -> Result<String, GatewayError> {
    let normalized = email.trim().to_lowercase();
    if normalized.is_empty() || !normalized.contains('@') {
        return Err(GatewayError::InvalidRequest(format!(
            "invalid email: {email:?}"
        )));
    }
    Ok(normalized)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() {
        let Ok(email) = normalize_email("  Alice@Example.COM ") else {
            panic!("expected valid email");
        };
        assert_eq!(email, "alice@example.com");
    }

    #[test]
    fn normalize_email_rejects_garbage() {
        assert!(normalize_email("").is_err());
        assert!(normalize_email("not-an-email").is_err());
    }

    #[test]
    fn balance_type_parses_aliases() {
        assert_eq!("credits".parse::<BalanceType>().ok(), Some(BalanceType::Credits));
        assert_eq!("Points".parse::<BalanceType>().ok(), Some(BalanceType::Points));
        let Err(GatewayError::InvalidBalanceType(raw)) = "gems".parse::<BalanceType>() else {
            panic!("expected invalid balance type");
        };
        assert_eq!(raw, "gems");
    }

    #[test]
    fn plan_allotments_increase_with_tier() {
        assert!(PlanTier::Starter.allotment() < PlanTier::Growth.allotment());
        assert!(PlanTier::Growth.allotment() < PlanTier::Pro.allotment());
        assert_eq!("PRO".parse::<PlanTier>().ok(), Some(PlanTier::Pro));
    }
}
