//! Type-safe boost identifier.
//!
//! [`BoostId`] wraps the opaque external transaction id that keys a boost
//! record. Paid boosts reuse the payment-session id issued by the payment
//! provider; credit-redeemed and internal boosts get a locally generated
//! id from [`BoostId::generate`].

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Prefix of locally generated ids, distinguishing them from payment-session
/// ids at a glance.
const LOCAL_PREFIX: &str = "boost_";

/// Primary key of a [`super::BoostRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct BoostId(String);

impl BoostId {
    /// Creates a new locally generated id (`boost_<uuid-v4-simple>`).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{LOCAL_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id was generated by this service rather than
    /// issued by the payment provider.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }
}

impl fmt::Display for BoostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BoostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BoostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<BoostId> for String {
    fn from(id: BoostId) -> Self {
        id.0
    }
}
