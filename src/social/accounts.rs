//! Posting accounts and their credentials.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Configured name of a posting account (e.g. `"main"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// OAuth 1.0a user-context credentials for one account.
#[derive(Clone)]
pub struct AccountCredentials {
    /// Account name.
    pub id: AccountId,
    /// Application consumer key.
    pub consumer_key: String,
    /// Application consumer secret.
    pub consumer_secret: String,
    /// User access token.
    pub access_token: String,
    /// User access token secret.
    pub access_secret: String,
    /// Platform user id; fetched from the API when unset.
    pub user_id: Option<String>,
    /// Public handle used to build post URLs.
    pub handle: Option<String>,
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// Ordered set of configured accounts.
///
/// Order is the failover order: the first account is the default primary
/// and the rest are fallbacks in sequence.
#[derive(Debug, Clone, Default)]
pub struct AccountRegistry {
    accounts: Vec<AccountCredentials>,
}

impl AccountRegistry {
    /// Builds a registry, keeping the first entry for duplicated ids.
    #[must_use]
    pub fn new(accounts: Vec<AccountCredentials>) -> Self {
        let mut unique: Vec<AccountCredentials> = Vec::with_capacity(accounts.len());
        for account in accounts {
            if unique.iter().any(|a| a.id == account.id) {
                tracing::warn!(account = %account.id, "duplicate account id ignored");
                continue;
            }
            unique.push(account);
        }
        Self { accounts: unique }
    }

    /// Looks up credentials by id.
    #[must_use]
    pub fn get(&self, id: &AccountId) -> Option<&AccountCredentials> {
        self.accounts.iter().find(|a| &a.id == id)
    }

    /// All accounts in failover order.
    #[must_use]
    pub fn all(&self) -> &[AccountCredentials] {
        &self.accounts
    }

    /// Every account except `id`, in failover order.
    pub fn others<'a>(
        &'a self,
        id: &'a AccountId,
    ) -> impl Iterator<Item = &'a AccountCredentials> + 'a {
        self.accounts.iter().filter(move |a| &a.id != id)
    }

    /// Ids of every account except `id`, in failover order.
    #[must_use]
    pub fn fallbacks_for(&self, id: &AccountId) -> Vec<AccountId> {
        self.others(id).map(|a| a.id.clone()).collect()
    }

    /// Number of configured accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` when no account is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
