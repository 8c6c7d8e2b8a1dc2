use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};

use super::{Engine, EngineOptions, EngineState};
use crate::args::HttpMethod;
use crate::error::{AppError, AppResult};
use crate::feeder::{Feeder, FeederPolicy, parse_records};
use crate::http::test_support::{catalog_route, spawn_mock};
use crate::http::{BaseUrl, ClientSettings, ConnectionGate, RequestExecutor, build_client};
use crate::injector::{InjectionSchedule, InjectionStep};
use crate::metrics::{Reporter, RunSummary};
use crate::scenario::{Check, RequestStep, Scenario, Step};

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

fn executor_for(base: &str) -> AppResult<RequestExecutor> {
    let client = build_client(&ClientSettings {
        request_timeout: Duration::from_secs(5),
        max_connections: 4,
        default_headers: Vec::new(),
    })?;
    Ok(RequestExecutor::new(
        client,
        BaseUrl::parse(base)?,
        ConnectionGate::new(4),
        Duration::from_secs(5),
    ))
}

fn offline_executor() -> AppResult<RequestExecutor> {
    executor_for("http://127.0.0.1:9")
}

fn engine_with(
    steps: Vec<Step>,
    profile: &[InjectionStep],
    feeder: Option<Feeder>,
    executor: RequestExecutor,
    options: EngineOptions,
) -> AppResult<Engine> {
    Ok(Engine::new(
        Arc::new(Scenario {
            name: "engine test".to_owned(),
            steps,
        }),
        InjectionSchedule::build(profile)?,
        feeder.map(Arc::new),
        executor,
        options,
    ))
}

fn engine(
    steps: Vec<Step>,
    profile: &[InjectionStep],
    feeder: Option<Feeder>,
    grace_period: Duration,
) -> AppResult<Engine> {
    engine_with(
        steps,
        profile,
        feeder,
        offline_executor()?,
        EngineOptions {
            grace_period,
            abort_on_failure: false,
        },
    )
}

fn request(name: &str, path: &str) -> RequestStep {
    RequestStep::new(name, HttpMethod::Get, path)
}

/// Two users fetch a game whose name check fails, then fetch it again.
async fn run_failing_check(abort_on_failure: bool) -> AppResult<RunSummary> {
    let server = spawn_mock(catalog_route)?;
    let steps = vec![
        Step::Request(Box::new(
            request("Get game", "/videogame/7").check(Check::path_is("name", "Mario")),
        )),
        Step::Request(Box::new(request("Get game again", "/videogame/7"))),
    ];
    let engine = engine_with(
        steps,
        &[InjectionStep::AtOnceUsers(2)],
        None,
        executor_for(&format!("{}/api", server.base))?,
        EngineOptions {
            grace_period: Duration::from_secs(1),
            abort_on_failure,
        },
    )?;
    let reporter = Reporter::spawn();
    engine.run(reporter.handle()).await;
    reporter.finish().await
}

#[test]
fn natural_completion_reaches_stopped() -> AppResult<()> {
    run_async_test(async {
        let engine = engine(
            vec![Step::Pause(Duration::from_millis(10))],
            &[InjectionStep::AtOnceUsers(3)],
            None,
            Duration::from_secs(1),
        )?;
        let handle = engine.handle();
        if handle.state() != EngineState::Idle {
            return Err(AppError::validation("Engine should start idle"));
        }

        let reporter = Reporter::spawn();
        let report = engine.run(reporter.handle()).await;
        let summary = reporter.finish().await?;

        if handle.state() != EngineState::Stopped || report.stop_requested {
            return Err(AppError::validation(format!(
                "Unexpected end state {} / {:?}",
                handle.state(),
                report
            )));
        }
        if report.users_started != 3 || summary.users.completed != 3 {
            return Err(AppError::validation(format!(
                "Unexpected users: {:?}",
                summary.users
            )));
        }
        Ok(())
    })
}

#[test]
fn stop_drains_immediately_and_stops_within_grace() -> AppResult<()> {
    run_async_test(async {
        let grace = Duration::from_millis(300);
        let engine = engine(
            vec![Step::Pause(Duration::from_secs(60))],
            &[InjectionStep::RampUsers {
                users: 100,
                during: Duration::from_secs(10),
            }],
            None,
            grace,
        )?;
        let handle = engine.handle();
        let reporter = Reporter::spawn();
        let run = tokio::spawn(engine.run(reporter.handle()));

        let wait_started = Instant::now();
        while handle.users_started() < 3 {
            if wait_started.elapsed() > Duration::from_secs(5) {
                return Err(AppError::validation("Users never started"));
            }
            sleep(Duration::from_millis(20)).await;
        }
        if handle.state() != EngineState::Running {
            return Err(AppError::validation("Engine should be running"));
        }

        handle.stop();
        let stopped_at = Instant::now();
        if handle.state() != EngineState::Draining {
            return Err(AppError::validation(format!(
                "Expected draining right after stop, got {}",
                handle.state()
            )));
        }
        let started_at_stop = handle.users_started();

        let report = timeout(grace + Duration::from_secs(2), run)
            .await
            .map_err(|_elapsed| AppError::validation("Engine did not stop in time"))??;
        let stop_took = stopped_at.elapsed();

        if handle.state() != EngineState::Stopped {
            return Err(AppError::validation("Engine should be stopped"));
        }
        if report.users_started != started_at_stop {
            return Err(AppError::validation(format!(
                "Users started after stop: {} -> {}",
                started_at_stop, report.users_started
            )));
        }
        if stop_took > grace + Duration::from_secs(1) {
            return Err(AppError::validation(format!(
                "Stop took {:?}, grace was {:?}",
                stop_took, grace
            )));
        }

        let summary = reporter.finish().await?;
        if summary.users.cancelled != started_at_stop || summary.users.completed != 0 {
            return Err(AppError::validation(format!(
                "Paused users should all be cancelled: {:?}",
                summary.users
            )));
        }
        Ok(())
    })
}

#[test]
fn stop_before_run_starts_nobody() -> AppResult<()> {
    run_async_test(async {
        let engine = engine(
            vec![Step::Pause(Duration::from_millis(1))],
            &[InjectionStep::AtOnceUsers(5)],
            None,
            Duration::from_secs(1),
        )?;
        let handle = engine.handle();
        handle.stop();
        let reporter = Reporter::spawn();
        let report = engine.run(reporter.handle()).await;
        if report.users_started != 0 || handle.state() != EngineState::Stopped {
            return Err(AppError::validation(format!("Unexpected report {:?}", report)));
        }
        Ok(())
    })
}

#[test]
fn exhausted_feeder_aborts_remaining_users() -> AppResult<()> {
    run_async_test(async {
        let records = parse_records(serde_json::json!([{"id": 1}]))?;
        let engine = engine(
            vec![Step::Feed, Step::Pause(Duration::from_millis(1))],
            &[InjectionStep::AtOnceUsers(3)],
            Some(Feeder::new(records, FeederPolicy::Sequential)),
            Duration::from_secs(1),
        )?;
        let reporter = Reporter::spawn();
        engine.run(reporter.handle()).await;
        let summary = reporter.finish().await?;

        if summary.users.completed != 1 || summary.users.aborted != 2 {
            return Err(AppError::validation(format!(
                "Unexpected users {:?}",
                summary.users
            )));
        }
        if summary.failure_reasons.get("feeder_exhausted") != Some(&2) {
            return Err(AppError::validation(format!(
                "Unexpected reasons {:?}",
                summary.failure_reasons
            )));
        }
        Ok(())
    })
}

#[test]
fn failed_check_aborts_user_when_configured() -> AppResult<()> {
    run_async_test(async {
        let summary = run_failing_check(true).await?;

        if summary.users.aborted != 2 || summary.users.completed != 0 {
            return Err(AppError::validation(format!(
                "Unexpected users {:?}",
                summary.users
            )));
        }
        if summary.count != 2 || summary.failure_reasons.get("check_failed") != Some(&2) {
            return Err(AppError::validation(format!(
                "Unexpected outcomes: {} total, reasons {:?}",
                summary.count, summary.failure_reasons
            )));
        }
        if summary
            .requests
            .iter()
            .any(|stats| stats.name == "Get game again")
        {
            return Err(AppError::validation(
                "No request should follow an aborting failure",
            ));
        }
        Ok(())
    })
}

#[test]
fn failed_check_continues_chain_by_default() -> AppResult<()> {
    run_async_test(async {
        let summary = run_failing_check(false).await?;

        if summary.users.completed != 2 || summary.users.aborted != 0 {
            return Err(AppError::validation(format!(
                "Unexpected users {:?}",
                summary.users
            )));
        }
        if summary.count != 4 || summary.successes != 2 || summary.failures != 2 {
            return Err(AppError::validation(format!(
                "Unexpected outcomes: {} total, {} ok, {} failed",
                summary.count, summary.successes, summary.failures
            )));
        }
        Ok(())
    })
}

#[test]
fn grace_expiry_cancels_in_flight_requests() -> AppResult<()> {
    run_async_test(async {
        let server = spawn_mock(catalog_route)?;
        let grace = Duration::from_millis(100);
        let engine = engine_with(
            vec![Step::Request(Box::new(request("Slow game", "/slow")))],
            &[InjectionStep::AtOnceUsers(2)],
            None,
            executor_for(&format!("{}/api", server.base))?,
            EngineOptions {
                grace_period: grace,
                abort_on_failure: false,
            },
        )?;
        let handle = engine.handle();
        let reporter = Reporter::spawn();
        let run = tokio::spawn(engine.run(reporter.handle()));

        let wait_started = Instant::now();
        while handle.users_started() < 2 {
            if wait_started.elapsed() > Duration::from_secs(5) {
                return Err(AppError::validation("Users never started"));
            }
            sleep(Duration::from_millis(10)).await;
        }
        // The slow route answers after 600ms, so both requests are still in flight.
        sleep(Duration::from_millis(100)).await;
        handle.stop();

        let report = timeout(grace + Duration::from_secs(2), run)
            .await
            .map_err(|_elapsed| AppError::validation("Engine did not stop in time"))??;
        if handle.state() != EngineState::Stopped || !report.stop_requested {
            return Err(AppError::validation(format!("Unexpected report {:?}", report)));
        }

        let summary = reporter.finish().await?;
        if summary.cancelled < 1 || summary.users.cancelled < 1 {
            return Err(AppError::validation(format!(
                "Expected cancelled requests and users, got {} / {:?}",
                summary.cancelled, summary.users
            )));
        }
        if summary.failures != 0 || summary.success_rate_x100 != 0 {
            return Err(AppError::validation(format!(
                "Cancelled requests must not count as failures: {} failures",
                summary.failures
            )));
        }
        Ok(())
    })
}
