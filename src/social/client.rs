//! Social platform API client.
//!
//! [`SocialClient`] is the seam between the poster/amplifier and the
//! platform. [`HttpSocialClient`] implements it against the v2 REST API
//! with OAuth 1.0a user-context signing.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, Method, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use super::classify::ProviderError;
use super::oauth;
use super::{AccountCredentials, AccountId};

/// Identity of the account behind a set of credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelfIdentity {
    /// Platform user id.
    pub id: String,
    /// Public handle.
    pub username: String,
}

/// Operations the gateway performs on the social platform.
#[async_trait]
pub trait SocialClient: Send + Sync + fmt::Debug {
    /// Publishes a post, optionally as a reply, and returns its id.
    ///
    /// # Errors
    ///
    /// Returns the provider's error response or a transport failure.
    async fn publish(
        &self,
        account: &AccountCredentials,
        text: &str,
        in_reply_to: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Likes a post as `account`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error response or a transport failure.
    async fn like(&self, account: &AccountCredentials, post_id: &str)
    -> Result<(), ProviderError>;

    /// Retweets a post as `account`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error response or a transport failure.
    async fn retweet(
        &self,
        account: &AccountCredentials,
        post_id: &str,
    ) -> Result<(), ProviderError>;

    /// Fetches the identity behind `account`.
    ///
    /// # Errors
    ///
    /// Returns the provider's error response or a transport failure.
    async fn fetch_self(&self, account: &AccountCredentials)
    -> Result<SelfIdentity, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// `reqwest`-based client for the platform's v2 API.
#[derive(Debug)]
pub struct HttpSocialClient {
    http: Client,
    api_base: String,
    identities: RwLock<HashMap<AccountId, SelfIdentity>>,
}

impl HttpSocialClient {
    /// Creates a client for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the HTTP client cannot be built.
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("boost-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            identities: RwLock::new(HashMap::new()),
        })
    }

    async fn send(
        &self,
        account: &AccountCredentials,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, ProviderError> {
        let url = format!("{}{path}", self.api_base);
        let authorization = oauth::authorization_header(account, method.as_str(), &url);
        let mut request = self
            .http
            .request(method, &url)
            .header(reqwest::header::AUTHORIZATION, authorization);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }

    /// Resolves the acting user id: configured, cached, or fetched.
    async fn user_id(&self, account: &AccountCredentials) -> Result<String, ProviderError> {
        if let Some(id) = &account.user_id {
            return Ok(id.clone());
        }
        Ok(self.fetch_self(account).await?.id)
    }
}

async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status();
    let rate_limit_reset = response
        .headers()
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

    let body = response.text().await.unwrap_or_default();
    let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
    let first = envelope.errors.first();
    let code = first.and_then(|e| e.code);
    let message = envelope
        .detail
        .or_else(|| first.and_then(|e| e.message.clone()))
        .or(envelope.title)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("provider error")
                .to_string()
        });

    ProviderError {
        status: Some(status.as_u16()),
        code,
        message,
        rate_limit_reset,
    }
}

#[async_trait]
impl SocialClient for HttpSocialClient {
    async fn publish(
        &self,
        account: &AccountCredentials,
        text: &str,
        in_reply_to: Option<&str>,
    ) -> Result<String, ProviderError> {
        let body = match in_reply_to {
            Some(parent) => json!({ "text": text, "reply": { "in_reply_to_tweet_id": parent } }),
            None => json!({ "text": text }),
        };
        let response = self
            .send(account, Method::POST, "/2/tweets", Some(body))
            .await?;
        let created: DataEnvelope<CreatedPost> = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("malformed publish response: {e}")))?;
        Ok(created.data.id)
    }

    async fn like(
        &self,
        account: &AccountCredentials,
        post_id: &str,
    ) -> Result<(), ProviderError> {
        let user_id = self.user_id(account).await?;
        self.send(
            account,
            Method::POST,
            &format!("/2/users/{user_id}/likes"),
            Some(json!({ "tweet_id": post_id })),
        )
        .await?;
        Ok(())
    }

    async fn retweet(
        &self,
        account: &AccountCredentials,
        post_id: &str,
    ) -> Result<(), ProviderError> {
        let user_id = self.user_id(account).await?;
        self.send(
            account,
            Method::POST,
            &format!("/2/users/{user_id}/retweets"),
            Some(json!({ "tweet_id": post_id })),
        )
        .await?;
        Ok(())
    }

    async fn fetch_self(
        &self,
        account: &AccountCredentials,
    ) -> Result<SelfIdentity, ProviderError> {
        if let Some(identity) = self.identities.read().await.get(&account.id) {
            return Ok(identity.clone());
        }
        let response = self.send(account, Method::GET, "/2/users/me", None).await?;
        let me: DataEnvelope<SelfIdentity> = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("malformed identity response: {e}")))?;
        self.identities
            .write()
            .await
            .insert(account.id.clone(), me.data.clone());
        Ok(me.data)
    }
}
