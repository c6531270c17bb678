//! Boost DTOs: order placement, status polling, redemption, internal boosts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    BalanceType, BoostId, BoostOrigin, BoostPayload, BoostRecord, BoostStatus, ContentDescriptor,
    ProductDescriptor,
};
use crate::error::GatewayError;
use crate::service::{OrderRequest, RedeemRequest, RedemptionReceipt};

/// Request body for `POST /boosts`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    /// Payment-session id the provider will confirm.
    pub transaction_id: String,
    /// Customer email for the completion notice.
    #[serde(default)]
    pub email: Option<String>,
    /// Product being promoted.
    pub product: ProductDescriptor,
    /// Paired content.
    pub content: ContentDescriptor,
    /// Post text; may contain placeholders.
    pub text: String,
}

impl From<PlaceOrderRequest> for OrderRequest {
    fn from(req: PlaceOrderRequest) -> Self {
        Self {
            transaction_id: BoostId::from(req.transaction_id),
            email: req.email,
            payload: BoostPayload {
                product: req.product,
                content: req.content,
                text: req.text,
            },
        }
    }
}

/// Status-poll projection of a boost record.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoostStatusResponse {
    /// Record id.
    pub transaction_id: BoostId,
    /// Lifecycle status.
    pub status: BoostStatus,
    /// Funding source.
    pub origin: BoostOrigin,
    /// Post URL once published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_post_url: Option<String>,
    /// Failure reason once failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<BoostRecord> for BoostStatusResponse {
    fn from(record: BoostRecord) -> Self {
        Self {
            external_post_url: record.result.map(|r| r.post_url),
            transaction_id: record.id,
            status: record.status,
            origin: record.origin,
            error: record.error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Request body for `POST /boosts/redeem`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RedeemBoostRequest {
    /// Customer whose balance pays.
    pub email: String,
    /// `credits` or `points`.
    pub balance_type: String,
    /// Product being promoted.
    pub product: ProductDescriptor,
    /// Paired content.
    pub content: ContentDescriptor,
    /// Post text; may contain placeholders.
    pub text: String,
}

impl TryFrom<RedeemBoostRequest> for RedeemRequest {
    type Error = GatewayError;

    fn try_from(req: RedeemBoostRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            balance: req.balance_type.parse::<BalanceType>()?,
            email: req.email,
            payload: BoostPayload {
                product: req.product,
                content: req.content,
                text: req.text,
            },
        })
    }
}

/// Response body for a successful redemption.
#[derive(Debug, Serialize, ToSchema)]
pub struct RedeemBoostResponse {
    /// Always `true`; failures use the error body.
    pub success: bool,
    /// Id of the new boost record.
    pub boost_id: BoostId,
    /// URL of the published post.
    pub external_post_url: String,
    /// Balance left after the debit.
    pub remaining_balance: i64,
}

impl From<RedemptionReceipt> for RedeemBoostResponse {
    fn from(receipt: RedemptionReceipt) -> Self {
        Self {
            success: true,
            boost_id: receipt.boost_id,
            external_post_url: receipt.post_url,
            remaining_balance: receipt.remaining_balance,
        }
    }
}

/// Request body for `POST /boosts/internal`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InternalBoostRequest {
    /// Product being promoted.
    pub product: ProductDescriptor,
    /// Paired content.
    pub content: ContentDescriptor,
    /// Post text; may contain placeholders.
    pub text: String,
}

impl From<InternalBoostRequest> for BoostPayload {
    fn from(req: InternalBoostRequest) -> Self {
        Self {
            product: req.product,
            content: req.content,
            text: req.text,
        }
    }
}

/// Acknowledgement returned to the payment provider.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    /// Always `true` once the event was accepted.
    pub received: bool,
    /// What the gateway did with the event.
    pub outcome: String,
}
