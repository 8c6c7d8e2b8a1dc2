use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};

use super::types::scaled_ratio;
use super::{
    LatencyHistogram, OutcomeStatus, RequestOutcome, RequestStats, RunSummary, UserCounts,
    UserEnd,
};

const REPORTER_QUEUE: usize = 4096;

enum ReporterCommand {
    Record(RequestOutcome),
    UserStarted,
    UserFinished(UserEnd),
    Snapshot(oneshot::Sender<RunSummary>),
}

/// Cloneable sender side of the reporter. Every virtual user holds one.
#[derive(Debug, Clone)]
pub struct ReporterHandle {
    tx: mpsc::Sender<ReporterCommand>,
}

impl ReporterHandle {
    pub async fn record(&self, outcome: RequestOutcome) {
        self.send(ReporterCommand::Record(outcome)).await;
    }

    pub async fn user_started(&self) {
        self.send(ReporterCommand::UserStarted).await;
    }

    pub async fn user_finished(&self, end: UserEnd) {
        self.send(ReporterCommand::UserFinished(end)).await;
    }

    /// Summary of everything recorded so far, or `None` once the reporter is gone.
    pub async fn summary(&self) -> Option<RunSummary> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .tx
            .send(ReporterCommand::Snapshot(reply_tx))
            .await
            .is_err()
        {
            return None;
        }
        reply_rx.await.ok()
    }

    async fn send(&self, command: ReporterCommand) {
        if self.tx.send(command).await.is_err() {
            debug!("Reporter closed; dropping update");
        }
    }
}

impl std::fmt::Debug for ReporterCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Record(outcome) => write!(f, "Record({})", outcome.name),
            Self::UserStarted => f.write_str("UserStarted"),
            Self::UserFinished(end) => write!(f, "UserFinished({:?})", end),
            Self::Snapshot(_) => f.write_str("Snapshot"),
        }
    }
}

/// Serialized owner of all aggregate counters. Outcomes arrive over a bounded
/// channel, so `record` is safe from any number of tasks.
#[derive(Debug)]
pub struct Reporter {
    handle: ReporterHandle,
    task: JoinHandle<()>,
}

impl Reporter {
    /// Starts the aggregation task on the current runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(REPORTER_QUEUE);
        let task = tokio::spawn(run_reporter(rx, ReporterState::new()));
        Self {
            handle: ReporterHandle { tx },
            task,
        }
    }

    #[must_use]
    pub fn handle(&self) -> ReporterHandle {
        self.handle.clone()
    }

    /// Takes the final summary and stops the aggregation task.
    ///
    /// # Errors
    ///
    /// Returns an error if the aggregation task died before answering.
    pub async fn finish(self) -> AppResult<RunSummary> {
        let summary = self.handle.summary().await;
        drop(self.handle);
        match summary {
            Some(summary) => {
                self.task.abort();
                Ok(summary)
            }
            None => {
                self.task.await?;
                Err(AppError::ReporterStopped)
            }
        }
    }
}

async fn run_reporter(mut rx: mpsc::Receiver<ReporterCommand>, mut state: ReporterState) {
    while let Some(command) = rx.recv().await {
        match command {
            ReporterCommand::Record(outcome) => state.record(&outcome),
            ReporterCommand::UserStarted => {
                state.users.started = state.users.started.saturating_add(1);
            }
            ReporterCommand::UserFinished(end) => state.user_finished(end),
            ReporterCommand::Snapshot(reply) => {
                if reply.send(state.summary()).is_err() {
                    debug!("Summary requester went away");
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    count: u64,
    successes: u64,
    failures: u64,
    cancelled: u64,
}

impl Counters {
    const fn add(&mut self, status: &OutcomeStatus) {
        self.count = self.count.saturating_add(1);
        match status {
            OutcomeStatus::Success => self.successes = self.successes.saturating_add(1),
            OutcomeStatus::Failure(_) => self.failures = self.failures.saturating_add(1),
            OutcomeStatus::Cancelled => self.cancelled = self.cancelled.saturating_add(1),
        }
    }
}

#[derive(Debug)]
struct NameStats {
    counters: Counters,
    latency: Option<LatencyHistogram>,
}

#[derive(Debug)]
struct ReporterState {
    started_at: String,
    run_start: Instant,
    totals: Counters,
    latency: Option<LatencyHistogram>,
    by_name: BTreeMap<Arc<str>, NameStats>,
    reasons: BTreeMap<&'static str, u64>,
    users: UserCounts,
    pool_waits: u64,
    pool_wait_max: Duration,
}

fn new_histogram(label: &str) -> Option<LatencyHistogram> {
    match LatencyHistogram::new() {
        Ok(histogram) => Some(histogram),
        Err(err) => {
            warn!("Failed to initialize {} histogram: {}", label, err);
            None
        }
    }
}

fn record_latency(histogram: Option<&mut LatencyHistogram>, latency: Duration) {
    if let Some(histogram) = histogram
        && let Err(err) = histogram.record(latency)
    {
        warn!("{}", err);
    }
}

impl ReporterState {
    fn new() -> Self {
        Self {
            started_at: Utc::now().to_rfc3339(),
            run_start: Instant::now(),
            totals: Counters::default(),
            latency: new_histogram("latency"),
            by_name: BTreeMap::new(),
            reasons: BTreeMap::new(),
            users: UserCounts::default(),
            pool_waits: 0,
            pool_wait_max: Duration::ZERO,
        }
    }

    fn record(&mut self, outcome: &RequestOutcome) {
        self.totals.add(&outcome.status);

        let entry = self
            .by_name
            .entry(Arc::clone(&outcome.name))
            .or_insert_with(|| NameStats {
                counters: Counters::default(),
                latency: new_histogram("request"),
            });
        entry.counters.add(&outcome.status);

        if let Some(wait) = outcome.pool_wait {
            self.pool_waits = self.pool_waits.saturating_add(1);
            self.pool_wait_max = self.pool_wait_max.max(wait);
        }

        match &outcome.status {
            OutcomeStatus::Success => {}
            OutcomeStatus::Failure(err) => {
                let reason = self.reasons.entry(err.code()).or_insert(0);
                *reason = reason.saturating_add(1);
            }
            OutcomeStatus::Cancelled => return,
        }
        record_latency(self.latency.as_mut(), outcome.duration);
        record_latency(entry.latency.as_mut(), outcome.duration);
    }

    const fn user_finished(&mut self, end: UserEnd) {
        let slot = match end {
            UserEnd::Completed => &mut self.users.completed,
            UserEnd::Aborted => &mut self.users.aborted,
            UserEnd::Cancelled => &mut self.users.cancelled,
        };
        *slot = slot.saturating_add(1);
    }

    fn summary(&self) -> RunSummary {
        let elapsed = self.run_start.elapsed();
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let completed = self.totals.successes.saturating_add(self.totals.failures);
        let (p50_us, p95_us, p99_us) = self
            .latency
            .as_ref()
            .map_or((0, 0, 0), LatencyHistogram::percentiles);

        let requests = self
            .by_name
            .iter()
            .map(|(name, stats)| {
                let (p50, p95, p99) = stats
                    .latency
                    .as_ref()
                    .map_or((0, 0, 0), LatencyHistogram::percentiles);
                RequestStats {
                    name: name.to_string(),
                    count: stats.counters.count,
                    failures: stats.counters.failures,
                    cancelled: stats.counters.cancelled,
                    p50_us: p50,
                    p95_us: p95,
                    p99_us: p99,
                }
            })
            .collect();

        RunSummary {
            started_at: self.started_at.clone(),
            duration_ms,
            count: self.totals.count,
            successes: self.totals.successes,
            failures: self.totals.failures,
            cancelled: self.totals.cancelled,
            success_rate_x100: scaled_ratio(self.totals.successes, completed),
            mean_us: self.latency.as_ref().map_or(0, LatencyHistogram::mean),
            p50_us,
            p95_us,
            p99_us,
            max_us: self.latency.as_ref().map_or(0, LatencyHistogram::max),
            throughput_x100: throughput_x100(completed, elapsed),
            requests,
            failure_reasons: self
                .reasons
                .iter()
                .map(|(reason, count)| ((*reason).to_owned(), *count))
                .collect(),
            users: self.users.clone(),
            pool_waits: self.pool_waits,
            pool_wait_max_ms: u64::try_from(self.pool_wait_max.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn throughput_x100(completed: u64, elapsed: Duration) -> u64 {
    if completed == 0 {
        return 0;
    }
    let duration_ms = elapsed.as_millis().max(1);
    let scaled = u128::from(completed)
        .saturating_mul(100_000)
        .checked_div(duration_ms)
        .unwrap_or(0);
    u64::try_from(scaled).map_or(u64::MAX, |value| value)
}
