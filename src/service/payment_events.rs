//! Payment-provider webhook events: signature verification and parsing.
//!
//! Events use the provider's envelope `{ id, type, data: { object } }`.
//! Only the fields the gateway acts on are extracted; everything else in
//! the payload stays opaque.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::domain::{BoostId, PlanTier};
use crate::error::GatewayError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Checks a `t=<unix>,v1=<hex>` signature over `"<t>.<body>"`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidSignature`] if the header is malformed,
/// the timestamp is outside `tolerance_secs` of `now`, or no `v1`
/// signature matches.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<(), GatewayError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| GatewayError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(GatewayError::InvalidSignature("missing v1 signature".to_string()));
    }
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| GatewayError::InvalidSignature("malformed timestamp".to_string()))?;
    if (now.timestamp() - signed_at).abs() > tolerance_secs {
        return Err(GatewayError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + body.len());
    signed_payload.extend_from_slice(timestamp.as_bytes());
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(body);

    for candidate in signatures {
        let Ok(expected) = hex::decode(candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        mac.update(&signed_payload);
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(GatewayError::InvalidSignature(
        "no matching signature".to_string(),
    ))
}

/// Computes the header value a provider would send for `body` at
/// `timestamp`.
#[must_use]
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    object: EventObject,
}

#[derive(Debug, Default, Deserialize)]
struct EventObject {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    customer_email: Option<String>,
    #[serde(default)]
    customer_details: Option<CustomerDetails>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    billing_reason: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerDetails {
    #[serde(default)]
    email: Option<String>,
}

impl EventObject {
    fn email(&self) -> Option<String> {
        self.customer_email
            .clone()
            .or_else(|| self.customer_details.as_ref().and_then(|d| d.email.clone()))
            .or_else(|| self.metadata.get("email").cloned())
    }
}

/// A webhook event the gateway acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// One-off checkout paid: publish the boost keyed by the session id.
    BoostPaid {
        /// Provider event id.
        event_id: String,
        /// Payment-session id, the boost's transaction id.
        transaction_id: BoostId,
    },
    /// Subscription checkout paid: provision the plan.
    SubscriptionStarted {
        /// Provider event id.
        event_id: String,
        /// Customer email.
        email: String,
        /// Purchased plan.
        plan: PlanTier,
        /// Provider subscription reference.
        subscription_ref: Option<String>,
    },
    /// Subscription renewal paid: reset credits.
    SubscriptionRenewed {
        /// Provider event id.
        event_id: String,
        /// Customer email.
        email: String,
    },
    /// Anything else; acknowledged and ignored.
    Ignored {
        /// Provider event id.
        event_id: String,
        /// Provider event type.
        event_type: String,
    },
}

impl PaymentEvent {
    /// Parses a raw webhook body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the body is not a valid
    /// envelope or a handled event lacks a field it needs.
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let envelope: Envelope = serde_json::from_slice(body)
            .map_err(|e| GatewayError::InvalidRequest(format!("malformed webhook event: {e}")))?;
        let event_id = envelope.id;
        let object = envelope.data.object;
        let missing =
            |field: &str| GatewayError::InvalidRequest(format!("webhook event missing {field}"));

        match envelope.event_type.as_str() {
            "checkout.session.completed" => match object.mode.as_deref() {
                Some("subscription") => {
                    let email = object.email().ok_or_else(|| missing("customer email"))?;
                    let plan = object
                        .metadata
                        .get("plan")
                        .ok_or_else(|| missing("metadata.plan"))?
                        .parse()?;
                    Ok(Self::SubscriptionStarted {
                        event_id,
                        email,
                        plan,
                        subscription_ref: object.subscription,
                    })
                }
                _ => {
                    let transaction_id = object.id.ok_or_else(|| missing("session id"))?;
                    Ok(Self::BoostPaid {
                        event_id,
                        transaction_id: BoostId::from(transaction_id),
                    })
                }
            },
            "invoice.payment_succeeded"
                if object.billing_reason.as_deref() == Some("subscription_cycle") =>
            {
                let email = object.email().ok_or_else(|| missing("customer email"))?;
                Ok(Self::SubscriptionRenewed { event_id, email })
            }
            other => Ok(Self::Ignored {
                event_id,
                event_type: other.to_string(),
            }),
        }
    }
}
