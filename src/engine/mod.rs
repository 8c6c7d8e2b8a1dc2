//! Engine state machine: dispatches virtual users on the injection schedule and
//! owns their lifetime until every user has finished or been cancelled.
mod state;
mod user;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, warn};

use crate::feeder::Feeder;
use crate::http::RequestExecutor;
use crate::injector::InjectionSchedule;
use crate::metrics::{ReporterHandle, UserEnd};
use crate::scenario::Scenario;

pub use state::{EngineHandle, EngineState};

use state::flag_raised;
use user::{UserContext, run_user};

/// Upper bound on how long cancelled users get to record their outcome before
/// their tasks are aborted.
const CANCEL_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub grace_period: Duration,
    pub abort_on_failure: bool,
}

/// What the engine observed while running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineReport {
    pub users_started: u64,
    pub stop_requested: bool,
    /// Users whose tasks had to be aborted after the settle bound.
    pub users_aborted_by_engine: u64,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Engine {
    scenario: Arc<Scenario>,
    schedule: InjectionSchedule,
    feeder: Option<Arc<Feeder>>,
    executor: RequestExecutor,
    options: EngineOptions,
    handle: EngineHandle,
}

impl Engine {
    #[must_use]
    pub fn new(
        scenario: Arc<Scenario>,
        schedule: InjectionSchedule,
        feeder: Option<Arc<Feeder>>,
        executor: RequestExecutor,
        options: EngineOptions,
    ) -> Self {
        Self {
            scenario,
            schedule,
            feeder,
            executor,
            options,
            handle: EngineHandle::new(),
        }
    }

    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Runs the schedule to completion or until stopped, then drains.
    pub async fn run(self, reporter: ReporterHandle) -> EngineReport {
        let run_start = Instant::now();
        let handle = self.handle.clone();
        if handle.stop_requested() {
            handle.advance(EngineState::Stopped);
            return EngineReport {
                stop_requested: true,
                ..EngineReport::default()
            };
        }

        let mut stop_rx = handle.stop_receiver();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let context = Arc::new(UserContext {
            scenario: self.scenario,
            feeder: self.feeder,
            executor: self.executor,
            reporter: reporter.clone(),
            abort_on_failure: self.options.abort_on_failure,
        });
        let mut users: JoinSet<UserEnd> = JoinSet::new();

        handle.advance(EngineState::Running);
        info!(
            "Engine running: {} users scheduled over {:?}",
            self.schedule.total_users(),
            self.schedule.last_offset()
        );

        'dispatch: for entry in self.schedule.entries() {
            let start_at = run_start.checked_add(entry.offset).unwrap_or(run_start);
            tokio::select! {
                biased;
                () = flag_raised(&mut stop_rx) => break 'dispatch,
                () = sleep_until(start_at) => {}
            }
            for _ in 0..entry.count {
                let Some(user_id) = handle.admit_user() else {
                    break 'dispatch;
                };
                reporter.user_started().await;
                users.spawn(run_user(Arc::clone(&context), user_id, cancel_rx.clone()));
            }
            while let Some(joined) = users.try_join_next() {
                log_join(&joined);
            }
        }

        handle.advance(EngineState::Draining);
        info!(
            "Engine draining: {} users started, {} in flight",
            handle.users_started(),
            users.len()
        );

        // A naturally exhausted schedule waits for its users until a stop arrives.
        loop {
            tokio::select! {
                biased;
                () = flag_raised(&mut stop_rx) => break,
                joined = users.join_next() => match joined {
                    Some(joined) => log_join(&joined),
                    None => break,
                },
            }
        }

        if !users.is_empty() {
            let deadline = Instant::now()
                .checked_add(self.options.grace_period)
                .unwrap_or_else(Instant::now);
            debug!("Grace period started for {} users", users.len());
            loop {
                tokio::select! {
                    biased;
                    joined = users.join_next() => match joined {
                        Some(joined) => log_join(&joined),
                        None => break,
                    },
                    () = sleep_until(deadline) => break,
                }
            }
        }

        let mut users_aborted_by_engine: u64 = 0;
        if !users.is_empty() {
            let gate = context.executor.gate();
            warn!(
                "Grace period elapsed; cancelling {} users ({} connections in use)",
                users.len(),
                gate.in_use()
            );
            cancel_tx.send_replace(true);
            gate.close();
            let settled = timeout(CANCEL_SETTLE, async {
                while let Some(joined) = users.join_next().await {
                    log_join(&joined);
                }
            })
            .await;
            if settled.is_err() {
                users.abort_all();
                while let Some(joined) = users.join_next().await {
                    if matches!(&joined, Err(err) if err.is_cancelled()) {
                        users_aborted_by_engine = users_aborted_by_engine.saturating_add(1);
                        reporter.user_finished(UserEnd::Cancelled).await;
                    } else {
                        log_join(&joined);
                    }
                }
            }
        }

        handle.advance(EngineState::Stopped);
        let elapsed = run_start.elapsed();
        info!("Engine stopped after {:?}", elapsed);

        EngineReport {
            users_started: handle.users_started(),
            stop_requested: handle.stop_requested(),
            users_aborted_by_engine,
            elapsed,
        }
    }
}

fn log_join(joined: &Result<UserEnd, JoinError>) {
    if let Err(err) = joined
        && !err.is_cancelled()
    {
        warn!("Virtual user task failed: {}", err);
    }
}
