//! Boost record: the durable unit of work tracked through its lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::BoostId;
use crate::error::GatewayError;

/// Lifecycle status of a boost.
///
/// `Pending` is the only non-terminal state. A record moves to exactly one
/// of `Published` or `Failed` and never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoostStatus {
    /// Created, not yet published.
    Pending,
    /// Posted successfully; result fields are set.
    Published,
    /// Every posting attempt failed; the error field is set.
    Failed,
}

impl BoostStatus {
    /// Returns `true` for `Published` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for BoostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown boost status: {other}")),
        }
    }
}

/// How a boost was funded. Used for accounting only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoostOrigin {
    /// One-off payment through the payment provider.
    Paid,
    /// One subscription credit.
    Subscription,
    /// Redeemed reward points.
    Reward,
    /// Published by the service itself.
    Internal,
}

impl BoostOrigin {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paid => "paid",
            Self::Subscription => "subscription",
            Self::Reward => "reward",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for BoostOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoostOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(Self::Paid),
            "subscription" => Ok(Self::Subscription),
            "reward" => Ok(Self::Reward),
            "internal" => Ok(Self::Internal),
            other => Err(format!("unknown boost origin: {other}")),
        }
    }
}

/// The customer's product being promoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProductDescriptor {
    /// Product name.
    pub name: String,
    /// Product landing page.
    pub url: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
}

/// Third-party content paired with the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContentDescriptor {
    /// Content title.
    #[serde(default)]
    pub title: String,
    /// Content URL.
    pub url: String,
    /// Short excerpt.
    #[serde(default)]
    pub snippet: String,
}

/// Everything needed to publish a boost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BoostPayload {
    /// Product descriptor.
    pub product: ProductDescriptor,
    /// Paired content descriptor.
    pub content: ContentDescriptor,
    /// Post text, possibly with unresolved placeholder tokens.
    pub text: String,
}

impl BoostPayload {
    /// Checks that every field needed at publish time is present.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] naming the first missing
    /// field.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let required = [
            ("text", &self.text),
            ("product.name", &self.product.name),
            ("product.url", &self.product.url),
            ("content.url", &self.content.url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(GatewayError::InvalidRequest(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PublishResult {
    /// Platform id of the new post.
    pub post_id: String,
    /// Public URL of the new post.
    pub post_url: String,
    /// When the post went out.
    pub published_at: DateTime<Utc>,
    /// Account that published it.
    pub account_id: String,
}

/// A boost and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostRecord {
    /// Primary key.
    pub id: BoostId,
    /// Current lifecycle status.
    pub status: BoostStatus,
    /// Funding source.
    pub origin: BoostOrigin,
    /// Customer to notify on completion, if known.
    pub customer_email: Option<String>,
    /// What to publish.
    pub payload: BoostPayload,
    /// Set only when `status == Published`.
    pub result: Option<PublishResult>,
    /// Set only when `status == Failed`.
    pub error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl BoostRecord {
    /// Creates a new `Pending` record.
    #[must_use]
    pub fn new(
        id: BoostId,
        origin: BoostOrigin,
        customer_email: Option<String>,
        payload: BoostPayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: BoostStatus::Pending,
            origin,
            customer_email,
            payload,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` once the record reached `Published` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the published post URL, if any.
    #[must_use]
    pub fn post_url(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.post_url.as_str())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Payload from the happy-path scenario.
    pub(crate) fn payload() -> BoostPayload {
        BoostPayload {
            product: ProductDescriptor {
                name: "Acme Widgets".to_string(),
                url: "https://p.example".to_string(),
                description: "Widgets for everyone".to_string(),
            },
            content: ContentDescriptor {
                title: "Ten widget tips".to_string(),
                url: "https://b.example/post".to_string(),
                snippet: "Tip one: buy widgets".to_string(),
            },
            text: "Check out [BLOG_LINK] and [PRODUCT_LINK]".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_pending_without_result() {
        let record = BoostRecord::new(
            BoostId::from("tx_1"),
            BoostOrigin::Paid,
            None,
            fixtures::payload(),
        );
        assert_eq!(record.status, BoostStatus::Pending);
        assert!(!record.is_terminal());
        assert!(record.result.is_none());
        assert!(record.error.is_none());
        assert!(record.post_url().is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!BoostStatus::Pending.is_terminal());
        assert!(BoostStatus::Published.is_terminal());
        assert!(BoostStatus::Failed.is_terminal());
    }

    #[test]
    fn status_and_origin_parse_their_storage_form() {
        for status in [BoostStatus::Pending, BoostStatus::Published, BoostStatus::Failed] {
            assert_eq!(status.as_str().parse::<BoostStatus>().ok(), Some(status));
        }
        for origin in [
            BoostOrigin::Paid,
            BoostOrigin::Subscription,
            BoostOrigin::Reward,
            BoostOrigin::Internal,
        ] {
            assert_eq!(origin.as_str().parse::<BoostOrigin>().ok(), Some(origin));
        }
        assert!("archived".parse::<BoostStatus>().is_err());
    }

    #[test]
    fn validate_rejects_blank_text() {
        let mut payload = fixtures::payload();
        payload.text = "   ".to_string();
        let Err(GatewayError::InvalidRequest(msg)) = payload.validate() else {
            panic!("expected validation error");
        };
        assert!(msg.contains("text"));
    }

    #[test]
    fn validate_rejects_missing_product_url() {
        let mut payload = fixtures::payload();
        payload.product.url.clear();
        assert!(payload.validate().is_err());
        assert!(fixtures::payload().validate().is_ok());
    }
}
