//! Social poster: bounded retries per account and ordered failover.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::classify::{ErrorClass, ProviderError, classify};
use super::client::SocialClient;
use super::{AccountCredentials, AccountId, AccountRegistry, PostError};

/// Retry and failover policy for one [`SocialPoster::post`] call.
#[derive(Debug, Clone)]
pub struct PostOptions {
    /// Attempts per account (at least one is always made).
    pub retries: u32,
    /// Base delay; attempt `n` is followed by a wait of `retry_delay * n`.
    pub retry_delay: Duration,
    /// Accounts tried, in order, after the primary gives up.
    pub fallback_accounts: Vec<AccountId>,
}

/// A successfully published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    /// Platform post id.
    pub post_id: String,
    /// Public URL of the post.
    pub post_url: String,
    /// Account that published it.
    pub account_id: AccountId,
}

/// Advisory per-account health, for diagnostics only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccountHealth {
    /// Last successful publish.
    pub last_success: Option<DateTime<Utc>>,
    /// Last failed attempt.
    pub last_failure: Option<DateTime<Utc>>,
    /// Message of the last failure.
    pub last_error: Option<String>,
    /// Classification of the last failure.
    pub last_error_class: Option<ErrorClass>,
    /// Failed attempts since the last success.
    pub consecutive_errors: u32,
    /// When the last observed rate-limit window resets.
    pub rate_limit_reset: Option<DateTime<Utc>>,
}

/// Publishes text through configured accounts.
#[derive(Debug)]
pub struct SocialPoster {
    client: Arc<dyn SocialClient>,
    accounts: Arc<AccountRegistry>,
    health: RwLock<HashMap<AccountId, AccountHealth>>,
}

impl SocialPoster {
    /// Creates a poster over the given client and accounts.
    #[must_use]
    pub fn new(client: Arc<dyn SocialClient>, accounts: Arc<AccountRegistry>) -> Self {
        Self {
            client,
            accounts,
            health: RwLock::new(HashMap::new()),
        }
    }

    /// The configured accounts.
    #[must_use]
    pub fn accounts(&self) -> &Arc<AccountRegistry> {
        &self.accounts
    }

    /// Publishes `text`, starting with `account_id` and falling back through
    /// `options.fallback_accounts` in order.
    ///
    /// Each account gets up to `options.retries` attempts. Transient and
    /// unknown failures are retried with linear backoff; auth, suspension,
    /// rate-limit and duplicate failures move straight to the next account.
    ///
    /// # Errors
    ///
    /// Returns [`PostError::CredentialsMissing`] if no candidate account has
    /// credentials, or [`PostError::Provider`] with the last failure when
    /// every candidate failed.
    pub async fn post(
        &self,
        text: &str,
        account_id: &AccountId,
        options: &PostOptions,
    ) -> Result<PostOutcome, PostError> {
        let mut candidates: Vec<&AccountId> = Vec::with_capacity(1 + options.fallback_accounts.len());
        for id in std::iter::once(account_id).chain(options.fallback_accounts.iter()) {
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }

        let mut last_error: Option<PostError> = None;
        for (index, id) in candidates.iter().enumerate() {
            let Some(credentials) = self.accounts.get(id) else {
                tracing::warn!(account = %id, "no credentials for account, skipping");
                continue;
            };
            if index > 0 {
                tracing::warn!(account = %id, "failing over to alternate account");
            }

            match self.post_with_retries(credentials, text, options).await {
                Ok(post_id) => {
                    self.record_success(&credentials.id).await;
                    let post_url = post_url(credentials, &post_id);
                    tracing::info!(account = %credentials.id, %post_id, "post published");
                    return Ok(PostOutcome {
                        post_id,
                        post_url,
                        account_id: credentials.id.clone(),
                    });
                }
                Err((class, err)) => {
                    last_error = Some(PostError::Provider {
                        account: credentials.id.clone(),
                        class,
                        message: err.to_string(),
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PostError::CredentialsMissing(
                candidates
                    .iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        }))
    }

    async fn post_with_retries(
        &self,
        credentials: &AccountCredentials,
        text: &str,
        options: &PostOptions,
    ) -> Result<String, (ErrorClass, ProviderError)> {
        let attempts = options.retries.max(1);
        let mut attempt = 1;
        loop {
            let err = match self.client.publish(credentials, text, None).await {
                Ok(post_id) => return Ok(post_id),
                Err(err) => err,
            };
            let class = classify(&err);
            self.record_failure(&credentials.id, class, &err).await;

            if !class.retry_same_account() {
                tracing::warn!(account = %credentials.id, attempt, %class, error = %err,
                    "non-retryable post failure");
                return Err((class, err));
            }
            if attempt >= attempts {
                tracing::warn!(account = %credentials.id, attempt, %class, error = %err,
                    "post attempts exhausted");
                return Err((class, err));
            }

            let delay = options.retry_delay.saturating_mul(attempt);
            tracing::debug!(account = %credentials.id, attempt, %class, ?delay, "retrying post");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn record_success(&self, id: &AccountId) {
        let mut health = self.health.write().await;
        let entry = health.entry(id.clone()).or_default();
        entry.last_success = Some(Utc::now());
        entry.consecutive_errors = 0;
    }

    async fn record_failure(&self, id: &AccountId, class: ErrorClass, err: &ProviderError) {
        let mut health = self.health.write().await;
        let entry = health.entry(id.clone()).or_default();
        entry.last_failure = Some(Utc::now());
        entry.last_error = Some(err.to_string());
        entry.last_error_class = Some(class);
        entry.consecutive_errors = entry.consecutive_errors.saturating_add(1);
        if class == ErrorClass::RateLimited {
            entry.rate_limit_reset = err.rate_limit_reset;
            tracing::warn!(account = %id, reset = ?err.rate_limit_reset, "account rate limited");
        }
    }

    /// Health snapshot for every configured account, in failover order.
    pub async fn health(&self) -> Vec<(AccountId, AccountHealth)> {
        let health = self.health.read().await;
        self.accounts
            .all()
            .iter()
            .map(|a| (a.id.clone(), health.get(&a.id).cloned().unwrap_or_default()))
            .collect()
    }
}

/// Public URL of a post made by `credentials`.
#[must_use]
pub fn post_url(credentials: &AccountCredentials, post_id: &str) -> String {
    match &credentials.handle {
        Some(handle) => format!("https://x.com/{handle}/status/{post_id}"),
        None => format!("https://x.com/i/web/status/{post_id}"),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::social::accounts::fixtures::credentials;
    use crate::social::client::fake::FakeSocialClient;

    fn options(fallbacks: &[&str]) -> PostOptions {
        PostOptions {
            retries: 3,
            retry_delay: Duration::ZERO,
            fallback_accounts: fallbacks.iter().map(|id| AccountId::from(*id)).collect(),
        }
    }

    fn poster(client: &Arc<FakeSocialClient>, ids: &[&str]) -> SocialPoster {
        let registry = AccountRegistry::new(ids.iter().map(|id| credentials(id)).collect());
        SocialPoster::new(
            Arc::clone(client) as Arc<dyn SocialClient>,
            Arc::new(registry),
        )
    }

    #[tokio::test]
    async fn publishes_with_primary() {
        let client = Arc::new(FakeSocialClient::new());
        let poster = poster(&client, &["main", "alt"]);

        let Ok(outcome) = poster.post("hello", &AccountId::from("main"), &options(&["alt"])).await
        else {
            panic!("post failed");
        };
        assert_eq!(outcome.account_id, AccountId::from("main"));
        assert_eq!(outcome.post_url, format!("https://x.com/main/status/{}", outcome.post_id));
        assert_eq!(client.publish_calls().await.len(), 1);
    }

    #[tokio::test]
    async fn forbidden_primary_fails_over_without_retry() {
        let client = Arc::new(FakeSocialClient::new());
        client
            .fail_always("main", ProviderError::http(403, None, "Forbidden"))
            .await;
        let poster = poster(&client, &["main", "alt"]);

        let Ok(outcome) = poster.post("hello", &AccountId::from("main"), &options(&["alt"])).await
        else {
            panic!("failover failed");
        };
        assert_eq!(outcome.account_id, AccountId::from("alt"));

        let calls = client.publish_calls().await;
        let main_calls = calls.iter().filter(|(a, _)| a == "main").count();
        assert_eq!(main_calls, 1);
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_on_same_account() {
        let client = Arc::new(FakeSocialClient::new());
        client
            .script(
                "main",
                vec![
                    Err(ProviderError::http(503, None, "Service Unavailable")),
                    Err(ProviderError::transport("timed out")),
                ],
            )
            .await;
        let poster = poster(&client, &["main", "alt"]);

        let Ok(outcome) = poster.post("hello", &AccountId::from("main"), &options(&["alt"])).await
        else {
            panic!("post failed");
        };
        assert_eq!(outcome.account_id, AccountId::from("main"));
        assert_eq!(client.publish_calls().await.len(), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded_before_failover() {
        let client = Arc::new(FakeSocialClient::new());
        client
            .fail_always("main", ProviderError::http(500, None, "Internal Error"))
            .await;
        let poster = poster(&client, &["main", "alt"]);

        tokio_test::assert_ok!(
            poster.post("hello", &AccountId::from("main"), &options(&["alt"])).await
        );
        let calls = client.publish_calls().await;
        assert_eq!(calls.iter().filter(|(a, _)| a == "main").count(), 3);
        assert_eq!(calls.iter().filter(|(a, _)| a == "alt").count(), 1);
    }

    #[tokio::test]
    async fn all_accounts_failing_surfaces_last_error() {
        let client = Arc::new(FakeSocialClient::new());
        client
            .fail_always("main", ProviderError::http(401, None, "Unauthorized"))
            .await;
        client
            .fail_always("alt", ProviderError::http(429, Some(88), "Too Many Requests"))
            .await;
        let poster = poster(&client, &["main", "alt"]);

        let Err(PostError::Provider { account, class, .. }) =
            poster.post("hello", &AccountId::from("main"), &options(&["alt"])).await
        else {
            panic!("expected provider error");
        };
        assert_eq!(account, AccountId::from("alt"));
        assert_eq!(class, ErrorClass::RateLimited);
    }

    #[tokio::test]
    async fn ordered_fallbacks_are_tried_in_sequence() {
        let client = Arc::new(FakeSocialClient::new());
        client.fail_always("main", ProviderError::http(403, Some(64), "suspended")).await;
        client.fail_always("alt1", ProviderError::http(401, None, "Unauthorized")).await;
        let poster = poster(&client, &["main", "alt1", "alt2"]);

        let Ok(outcome) = poster
            .post("hello", &AccountId::from("main"), &options(&["alt1", "alt2"]))
            .await
        else {
            panic!("post failed");
        };
        assert_eq!(outcome.account_id, AccountId::from("alt2"));
        let order: Vec<String> = client.publish_calls().await.into_iter().map(|(a, _)| a).collect();
        assert_eq!(order, ["main", "alt1", "alt2"]);
    }

    #[tokio::test]
    async fn missing_credentials_fall_through_to_fallback() {
        let client = Arc::new(FakeSocialClient::new());
        let poster = poster(&client, &["alt"]);

        let Ok(outcome) = poster.post("hello", &AccountId::from("ghost"), &options(&["alt"])).await
        else {
            panic!("post failed");
        };
        assert_eq!(outcome.account_id, AccountId::from("alt"));
    }

    #[tokio::test]
    async fn no_credentials_anywhere() {
        let client = Arc::new(FakeSocialClient::new());
        let poster = poster(&client, &[]);

        let result = poster.post("hello", &AccountId::from("ghost"), &options(&[])).await;
        assert!(matches!(result, Err(PostError::CredentialsMissing(_))));
        assert!(client.publish_calls().await.is_empty());
    }

    #[tokio::test]
    async fn health_tracks_failures_and_resets_on_success() {
        let client = Arc::new(FakeSocialClient::new());
        client
            .script("main", vec![Err(ProviderError::http(502, None, "Bad Gateway"))])
            .await;
        let poster = poster(&client, &["main"]);
        let _ = poster.post("hello", &AccountId::from("main"), &options(&[])).await;

        let health = poster.health().await;
        let Some((id, main)) = health.first() else {
            panic!("missing health entry");
        };
        assert_eq!(id, &AccountId::from("main"));
        assert_eq!(main.consecutive_errors, 0);
        assert!(main.last_success.is_some());
        assert_eq!(main.last_error_class, Some(ErrorClass::Transient));
    }
}
