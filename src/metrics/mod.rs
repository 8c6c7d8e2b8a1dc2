mod histogram;
mod reporter;
mod types;

#[cfg(test)]
mod tests;

pub use histogram::LatencyHistogram;
pub use reporter::{Reporter, ReporterHandle};
pub use types::{
    OutcomeStatus, RequestOutcome, RequestStats, RunSummary, UserCounts, UserEnd,
};
