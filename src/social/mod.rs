//! Social platform layer: accounts, API client, poster, amplifier.
//!
//! The [`SocialPoster`] publishes a boost with bounded retries and ordered
//! account failover; the [`EngagementAmplifier`] has the remaining accounts
//! engage with the new post. Both talk to the platform through the
//! [`SocialClient`] trait and interpret failures only through
//! [`classify()`].

pub mod accounts;
pub mod amplifier;
pub mod classify;
pub mod client;
pub mod oauth;
pub mod poster;

pub use accounts::{AccountCredentials, AccountId, AccountRegistry};
pub use amplifier::{AmplifySummary, EngagementAmplifier};
pub use classify::{ErrorClass, ProviderError, classify};
pub use client::{HttpSocialClient, SocialClient};
pub use poster::{AccountHealth, PostOptions, PostOutcome, SocialPoster};

/// Terminal failure of a [`SocialPoster::post`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostError {
    /// None of the candidate accounts has credentials configured.
    #[error("no credentials configured for accounts: {0}")]
    CredentialsMissing(String),

    /// The last candidate account failed.
    #[error("{account}: {class}: {message}")]
    Provider {
        /// Account of the last attempt.
        account: AccountId,
        /// Classified failure.
        class: ErrorClass,
        /// Provider message.
        message: String,
    },
}
