//! Notification collaborator: tells the customer their boost went out.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use crate::domain::BoostRecord;

/// Failure to deliver a notification. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport failure or non-success response.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Receives completed boosts.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Informs the customer that `record` was published.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] if the message could not be sent.
    async fn boost_completed(&self, record: &BoostRecord) -> Result<(), NotifyError>;
}

/// Notifier that only logs. Used when no delivery endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn boost_completed(&self, record: &BoostRecord) -> Result<(), NotifyError> {
        tracing::info!(
            boost_id = %record.id,
            email = record.customer_email.as_deref().unwrap_or("-"),
            post_url = record.post_url().unwrap_or("-"),
            "boost completed"
        );
        Ok(())
    }
}

/// Posts completed boosts as JSON to an external mail/notification service.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    /// Creates a notifier posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Delivery`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

/// JSON sent for a completed boost; `None` when there is nobody to tell.
fn notification_body(record: &BoostRecord) -> Option<Value> {
    let email = record.customer_email.as_deref()?;
    Some(json!({
        "boost_id": record.id,
        "email": email,
        "product": record.payload.product.name,
        "post_url": record.post_url(),
        "published_at": record.result.as_ref().map(|r| r.published_at),
    }))
}

fn check_status(status: StatusCode) -> Result<(), NotifyError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(NotifyError::Delivery(format!("endpoint returned {status}")))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn boost_completed(&self, record: &BoostRecord) -> Result<(), NotifyError> {
        let Some(body) = notification_body(record) else {
            tracing::debug!(boost_id = %record.id, "no customer email, skipping notification");
            return Ok(());
        };
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        check_status(response.status())
    }
}
