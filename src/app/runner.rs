use tracing::{debug, info, warn};

use crate::config::Simulation;
use crate::engine::{Engine, EngineOptions, EngineReport};
use crate::error::AppResult;
use crate::http::{self, BaseUrl, ClientSettings, ConnectionGate, RequestExecutor};
use crate::metrics::{Reporter, RunSummary};
use crate::shutdown_handlers::{
    forward_shutdown_to_engine, setup_signal_shutdown_handler, shutdown_channel,
};
use crate::sinks;

/// Result of a completed run. Only setup errors prevent one from existing.
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub engine: EngineReport,
    /// Failure rate stayed within the configured threshold.
    pub passed: bool,
}

/// Runs the simulation end to end and writes its summary to the configured sink.
///
/// # Errors
///
/// Returns an error when the client cannot be built, the preflight request
/// fails, the reporter stops early, or the summary cannot be written.
pub async fn run_local(simulation: Simulation) -> AppResult<RunOutcome> {
    let Simulation {
        name,
        run,
        scenario,
        injection,
        schedule,
        feeder,
        output,
    } = simulation;

    info!("Running test with {} users", schedule.total_users());
    info!("Ramping users over {:?}", run.ramp_duration);
    for step in &injection {
        debug!("Injection step: {}", step);
    }

    let base = BaseUrl::parse(&run.base_url)?;
    let client = http::build_client(&ClientSettings {
        request_timeout: run.request_timeout,
        max_connections: run.max_connections,
        default_headers: run.default_headers.clone(),
    })?;
    if run.preflight {
        http::preflight(&client, &base).await?;
    }

    let executor = RequestExecutor::new(
        client,
        base,
        ConnectionGate::new(run.max_connections),
        run.request_timeout,
    );
    let engine = Engine::new(
        scenario,
        schedule,
        feeder,
        executor,
        EngineOptions {
            grace_period: run.grace_period,
            abort_on_failure: run.abort_on_failure,
        },
    );

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let signal_task = setup_signal_shutdown_handler(&shutdown_tx);
    let forward_task = forward_shutdown_to_engine(shutdown_rx, engine.handle());

    let reporter = Reporter::spawn();
    let engine_report = engine.run(reporter.handle()).await;

    forward_task.abort();
    drop(shutdown_tx.send(()));
    if let Err(err) = signal_task.await {
        warn!("Signal handler task failed: {}", err);
    }

    let summary = reporter.finish().await?;
    let failure_rate_x100 = summary.failure_rate_x100();
    let passed = summary.failure_rate_within(run.max_failure_rate_x100);
    info!(
        "Run {} finished: {} requests, {} failed, {} cancelled",
        name, summary.count, summary.failures, summary.cancelled
    );
    if !passed {
        warn!(
            "Failure rate {} exceeds threshold {} (hundredths of a percent)",
            failure_rate_x100, run.max_failure_rate_x100
        );
    }

    sinks::write_summary(&output, &name, &summary, passed).await?;

    Ok(RunOutcome {
        summary,
        engine: engine_report,
        passed,
    })
}
