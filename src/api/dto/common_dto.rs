//! Shared DTO types for the diagnostic endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::BoostStatus;
use crate::persistence::BoostStat;
use crate::social::{AccountHealth, AccountId};

/// Query parameters for `GET /stats`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct StatsParams {
    /// Window size in hours (1 to 8760). Defaults to 24.
    #[serde(default = "default_since_hours")]
    pub since_hours: u32,
}

fn default_since_hours() -> u32 {
    24
}

impl StatsParams {
    /// Start of the requested window, clamped to one year.
    #[must_use]
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::hours(i64::from(self.since_hours.clamp(1, 8_760)))
    }
}

/// Derived boost counters.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Start of the window.
    pub since: DateTime<Utc>,
    /// Records created in the window.
    pub total: i64,
    /// Of which still pending.
    pub pending: i64,
    /// Of which published.
    pub published: i64,
    /// Of which failed.
    pub failed: i64,
    /// Counts by origin and status.
    pub buckets: Vec<BoostStat>,
}

impl StatsResponse {
    /// Totals the buckets.
    #[must_use]
    pub fn new(since: DateTime<Utc>, buckets: Vec<BoostStat>) -> Self {
        let count = |status: BoostStatus| {
            buckets
                .iter()
                .filter(|b| b.status == status)
                .map(|b| b.count)
                .sum::<i64>()
        };
        Self {
            since,
            total: buckets.iter().map(|b| b.count).sum(),
            pending: count(BoostStatus::Pending),
            published: count(BoostStatus::Published),
            failed: count(BoostStatus::Failed),
            buckets,
        }
    }
}

/// Health of one posting account.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountHealthDto {
    /// Account id.
    pub account: AccountId,
    /// Advisory counters.
    #[serde(flatten)]
    pub health: AccountHealth,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoostOrigin;

    #[test]
    fn stats_totals_by_status() {
        let buckets = vec![
            BoostStat {
                origin: BoostOrigin::Paid,
                status: BoostStatus::Published,
                count: 3,
            },
            BoostStat {
                origin: BoostOrigin::Reward,
                status: BoostStatus::Published,
                count: 2,
            },
            BoostStat {
                origin: BoostOrigin::Paid,
                status: BoostStatus::Failed,
                count: 1,
            },
        ];
        let stats = StatsResponse::new(Utc::now(), buckets);
        assert_eq!(stats.total, 6);
        assert_eq!(stats.published, 5);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
    }

    #[test]
    fn since_window_is_clamped() {
        let now = Utc::now();
        let params = StatsParams { since_hours: 0 };
        assert_eq!(params.since(now), now - chrono::Duration::hours(1));
    }
}
