use std::time::Duration;

use thiserror::Error;

/// Failures local to one virtual user's step. These are recorded, never propagated
/// past the user that hit them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Feeder exhausted.")]
    FeederExhausted,
    #[error("Unresolved placeholder '#{{{key}}}'.")]
    UnresolvedPlaceholder { key: String },
    #[error("Check '{check}' failed: {detail}")]
    CheckFailed { check: String, detail: String },
    #[error("Request timed out after {0:?}.")]
    Timeout(Duration),
    #[error("Transport error: {detail}")]
    Transport { detail: String },
    #[error("Unexpected status {status}.")]
    UnexpectedStatus { status: u16 },
    #[error("Invalid request: {detail}")]
    InvalidRequest { detail: String },
    #[error("Cancelled by engine shutdown.")]
    Cancelled,
}

impl StepError {
    /// Stable reason code used as the failure-breakdown key in reports.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::FeederExhausted => "feeder_exhausted",
            Self::UnresolvedPlaceholder { .. } => "unresolved_placeholder",
            Self::CheckFailed { .. } => "check_failed",
            Self::Timeout(_) => "timeout",
            Self::Transport { .. } => "transport",
            Self::UnexpectedStatus { .. } => "status",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Cancelled => "cancelled",
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() {
            Self::InvalidRequest {
                detail: err.to_string(),
            }
        } else {
            Self::Transport {
                detail: err.to_string(),
            }
        }
    }
}
