use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::feeder::Feeder;
use crate::http::RequestExecutor;
use crate::metrics::{OutcomeStatus, ReporterHandle, RequestOutcome, UserEnd};
use crate::scenario::{RequestStep, Scenario, Step};
use crate::session::Session;

use super::state::flag_raised;

const FEED_STEP_NAME: &str = "feed";

/// Read-only state shared by every virtual user of one run.
#[derive(Debug)]
pub(super) struct UserContext {
    pub(super) scenario: Arc<Scenario>,
    pub(super) feeder: Option<Arc<Feeder>>,
    pub(super) executor: RequestExecutor,
    pub(super) reporter: ReporterHandle,
    pub(super) abort_on_failure: bool,
}

/// Walks the scenario once for one user and reports how the user ended.
pub(super) async fn run_user(
    context: Arc<UserContext>,
    user_id: u64,
    mut cancel: watch::Receiver<bool>,
) -> UserEnd {
    let end = walk_scenario(&context, user_id, &mut cancel).await;
    debug!("User {} finished: {:?}", user_id, end);
    context.reporter.user_finished(end).await;
    end
}

async fn walk_scenario(
    context: &UserContext,
    user_id: u64,
    cancel: &mut watch::Receiver<bool>,
) -> UserEnd {
    let mut session = Session::new(user_id);

    for step in &context.scenario.steps {
        if *cancel.borrow() {
            return UserEnd::Cancelled;
        }
        match step {
            Step::Pause(duration) => {
                tokio::select! {
                    biased;
                    () = flag_raised(cancel) => return UserEnd::Cancelled,
                    () = sleep(*duration) => {}
                }
            }
            Step::Feed => {
                let Some(feeder) = context.feeder.as_ref() else {
                    continue;
                };
                match feeder.next() {
                    Ok(record) => session.merge(&record),
                    Err(err) => {
                        warn!("User {} stopped at feed step: {}", user_id, err);
                        context
                            .reporter
                            .record(RequestOutcome {
                                name: Arc::from(FEED_STEP_NAME),
                                user_id,
                                start: Instant::now(),
                                duration: Duration::ZERO,
                                status: OutcomeStatus::Failure(err),
                                http_status: None,
                                pool_wait: None,
                            })
                            .await;
                        return UserEnd::Aborted;
                    }
                }
            }
            Step::Request(request) => {
                let started = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    () = flag_raised(cancel) => cancelled_outcome(request, user_id, started),
                    outcome = context.executor.execute(request, &mut session) => outcome,
                };

                let end = match &outcome.status {
                    OutcomeStatus::Success => None,
                    OutcomeStatus::Cancelled => Some(UserEnd::Cancelled),
                    OutcomeStatus::Failure(err) => {
                        let label = session
                            .render(request.name.as_str())
                            .unwrap_or_else(|_unresolved| request.name.as_str().to_owned());
                        warn!("User {} request '{}' failed: {}", user_id, label, err);
                        context.abort_on_failure.then_some(UserEnd::Aborted)
                    }
                };
                context.reporter.record(outcome).await;
                if let Some(end) = end {
                    return end;
                }
            }
        }
    }

    UserEnd::Completed
}

fn cancelled_outcome(request: &RequestStep, user_id: u64, started: Instant) -> RequestOutcome {
    RequestOutcome {
        name: request.name.shared_source(),
        user_id,
        start: started,
        duration: started.elapsed(),
        status: OutcomeStatus::Cancelled,
        http_status: None,
        pool_wait: None,
    }
}
