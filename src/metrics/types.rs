use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::StepError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failure(StepError),
    /// Interrupted by engine shutdown; excluded from the success rate.
    Cancelled,
}

/// One request attempt, emitted exactly once.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// Unrendered request name, used as the breakdown key.
    pub name: Arc<str>,
    pub user_id: u64,
    pub start: Instant,
    pub duration: Duration,
    pub status: OutcomeStatus,
    pub http_status: Option<u16>,
    /// Time spent waiting for a connection slot, when the gate was saturated.
    pub pool_wait: Option<Duration>,
}

impl RequestOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Success)
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&StepError> {
        match &self.status {
            OutcomeStatus::Failure(err) => Some(err),
            OutcomeStatus::Success | OutcomeStatus::Cancelled => None,
        }
    }
}

/// How a virtual user left its scenario chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEnd {
    Completed,
    /// Stopped early by feeder exhaustion or abort-on-failure.
    Aborted,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UserCounts {
    pub started: u64,
    pub completed: u64,
    pub aborted: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestStats {
    pub name: String,
    pub count: u64,
    pub failures: u64,
    pub cancelled: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: String,
    pub duration_ms: u64,
    /// Every emitted outcome, cancelled ones included.
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub cancelled: u64,
    /// Successes over completed (non-cancelled) requests, in hundredths of a percent.
    pub success_rate_x100: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
    /// Completed requests per second, times 100.
    pub throughput_x100: u64,
    pub requests: Vec<RequestStats>,
    pub failure_reasons: BTreeMap<String, u64>,
    pub users: UserCounts,
    pub pool_waits: u64,
    pub pool_wait_max_ms: u64,
}

impl RunSummary {
    /// Fraction in `[0, 1]`.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        fraction_x100(self.success_rate_x100)
    }

    /// Completed requests per second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        fraction_x100(self.throughput_x100.saturating_mul(100))
    }

    #[must_use]
    pub const fn completed(&self) -> u64 {
        self.successes.saturating_add(self.failures)
    }

    /// Failures over completed requests, in hundredths of a percent.
    #[must_use]
    pub fn failure_rate_x100(&self) -> u64 {
        scaled_ratio(self.failures, self.completed())
    }

    /// Exact comparison of failures over completed requests against a threshold
    /// in hundredths of a percent. A zero threshold tolerates no failure at all.
    #[must_use]
    pub fn failure_rate_within(&self, max_x100: u64) -> bool {
        let failures = u128::from(self.failures).saturating_mul(10_000);
        let allowed = u128::from(max_x100).saturating_mul(u128::from(self.completed()));
        failures <= allowed
    }
}

#[expect(
    clippy::float_arithmetic,
    reason = "Float view of a fixed-point value for callers"
)]
fn fraction_x100(value: u64) -> f64 {
    value as f64 / 10_000.0
}

pub(super) fn scaled_ratio(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    let scaled = u128::from(part)
        .saturating_mul(10_000)
        .checked_div(u128::from(total))
        .unwrap_or(0);
    u64::try_from(scaled).map_or(u64::MAX, |value| value)
}
