use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::{LatencyHistogram, OutcomeStatus, Reporter, RequestOutcome, UserEnd};
use crate::error::{AppError, AppResult, StepError};

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::validation(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

fn outcome(name: &str, millis: u64, status: OutcomeStatus) -> RequestOutcome {
    RequestOutcome {
        name: Arc::from(name),
        user_id: 1,
        start: Instant::now(),
        duration: Duration::from_millis(millis),
        status,
        http_status: Some(200),
        pool_wait: None,
    }
}

#[test]
fn histogram_reports_percentiles_in_micros() -> Result<(), String> {
    let mut histogram = LatencyHistogram::new()?;
    for millis in 1..=100_u64 {
        histogram.record(Duration::from_millis(millis))?;
    }
    let (p50, p95, p99) = histogram.percentiles();
    // Three significant digits: within 0.1% of the exact value.
    for (label, value, exact) in [("p50", p50, 50_000), ("p95", p95, 95_000), ("p99", p99, 99_000)]
    {
        if value.abs_diff(exact) > exact / 1000 {
            return Err(format!("{} = {}us, expected about {}us", label, value, exact));
        }
    }
    if histogram.count() != 100 {
        return Err(format!("Unexpected count {}", histogram.count()));
    }
    Ok(())
}

#[test]
fn empty_histogram_is_zero() -> Result<(), String> {
    let histogram = LatencyHistogram::new()?;
    if histogram.percentiles() != (0, 0, 0) || histogram.max() != 0 || histogram.mean() != 0 {
        return Err("Empty histogram should report zeros".to_owned());
    }
    Ok(())
}

#[test]
fn summary_aggregates_outcomes() -> AppResult<()> {
    run_async_test(async {
        let reporter = Reporter::spawn();
        let handle = reporter.handle();

        for _ in 0..3 {
            handle.user_started().await;
        }
        handle
            .record(outcome("Get all games", 10, OutcomeStatus::Success))
            .await;
        handle
            .record(outcome("Get all games", 20, OutcomeStatus::Success))
            .await;
        handle
            .record(outcome(
                "Create game",
                30,
                OutcomeStatus::Failure(StepError::Timeout(Duration::from_secs(1))),
            ))
            .await;
        handle
            .record(outcome("Create game", 5, OutcomeStatus::Cancelled))
            .await;
        let mut waited = outcome("Delete game", 40, OutcomeStatus::Success);
        waited.pool_wait = Some(Duration::from_millis(12));
        handle.record(waited).await;
        handle.user_finished(UserEnd::Completed).await;
        handle.user_finished(UserEnd::Aborted).await;
        handle.user_finished(UserEnd::Cancelled).await;

        let summary = reporter.finish().await?;

        if summary.count != 5 || summary.successes != 3 || summary.failures != 1 {
            return Err(AppError::validation(format!(
                "Unexpected totals: {:?}",
                summary
            )));
        }
        if summary.cancelled != 1 {
            return Err(AppError::validation("Cancelled outcome not tracked"));
        }
        // 3 of 4 completed requests succeeded; the cancelled one is excluded.
        if summary.success_rate_x100 != 7_500 {
            return Err(AppError::validation(format!(
                "Unexpected success rate {}",
                summary.success_rate_x100
            )));
        }
        if summary.failure_reasons.get("timeout") != Some(&1) {
            return Err(AppError::validation(format!(
                "Unexpected reasons {:?}",
                summary.failure_reasons
            )));
        }
        if summary.pool_waits != 1 || summary.pool_wait_max_ms != 12 {
            return Err(AppError::validation("Pool waits not reported"));
        }
        if summary.users.started != 3
            || summary.users.completed != 1
            || summary.users.aborted != 1
            || summary.users.cancelled != 1
        {
            return Err(AppError::validation(format!(
                "Unexpected users {:?}",
                summary.users
            )));
        }

        let names: Vec<&str> = summary
            .requests
            .iter()
            .map(|stats| stats.name.as_str())
            .collect();
        if names != ["Create game", "Delete game", "Get all games"] {
            return Err(AppError::validation(format!("Unexpected names {:?}", names)));
        }
        let create = summary
            .requests
            .first()
            .ok_or_else(|| AppError::validation("Missing request stats"))?;
        if create.count != 2 || create.failures != 1 || create.cancelled != 1 {
            return Err(AppError::validation(format!(
                "Unexpected create stats {:?}",
                create
            )));
        }
        Ok(())
    })
}

#[test]
fn concurrent_records_are_all_counted() -> AppResult<()> {
    run_async_test(async {
        let reporter = Reporter::spawn();
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let handle = reporter.handle();
            tasks.spawn(async move {
                for _ in 0..50 {
                    handle
                        .record(outcome("Get all games", 1, OutcomeStatus::Success))
                        .await;
                }
            });
        }
        while let Some(result) = tasks.join_next().await {
            result?;
        }

        let summary = reporter.finish().await?;
        if summary.count != 1_000 || summary.success_rate_x100 != 10_000 {
            return Err(AppError::validation(format!(
                "Unexpected totals: count={} rate={}",
                summary.count, summary.success_rate_x100
            )));
        }
        Ok(())
    })
}

#[test]
fn empty_run_has_zero_rates() -> AppResult<()> {
    run_async_test(async {
        let summary = Reporter::spawn().finish().await?;
        if summary.count != 0 || summary.success_rate_x100 != 0 || summary.throughput_x100 != 0 {
            return Err(AppError::validation("Empty run should report zeros"));
        }
        if summary.failure_rate_x100() != 0 || !summary.failure_rate_within(0) {
            return Err(AppError::validation("Empty run has no failures"));
        }
        Ok(())
    })
}

#[test]
fn failure_threshold_is_compared_exactly() -> AppResult<()> {
    run_async_test(async {
        let reporter = Reporter::spawn();
        let handle = reporter.handle();
        handle
            .record(outcome("Get all games", 1, OutcomeStatus::Success))
            .await;
        handle
            .record(outcome("Get all games", 1, OutcomeStatus::Success))
            .await;
        handle
            .record(outcome(
                "Get all games",
                1,
                OutcomeStatus::Failure(StepError::UnexpectedStatus { status: 500 }),
            ))
            .await;
        handle
            .record(outcome("Get all games", 1, OutcomeStatus::Cancelled))
            .await;

        let summary = reporter.finish().await?;
        let verdicts = [
            (0, false),
            (3_333, false),
            (3_334, true),
            (10_000, true),
        ];
        for (threshold, expected) in verdicts {
            if summary.failure_rate_within(threshold) != expected {
                return Err(AppError::validation(format!(
                    "Threshold {} expected {} for {} failures of {}",
                    threshold,
                    expected,
                    summary.failures,
                    summary.completed()
                )));
            }
        }
        Ok(())
    })
}

#[test]
fn cancelled_outcomes_still_count_gate_waits() -> AppResult<()> {
    run_async_test(async {
        let reporter = Reporter::spawn();
        let handle = reporter.handle();
        let mut cancelled = outcome("Get all games", 40, OutcomeStatus::Cancelled);
        cancelled.pool_wait = Some(Duration::from_millis(35));
        handle.record(cancelled).await;

        let summary = reporter.finish().await?;
        if summary.cancelled != 1 || summary.completed() != 0 {
            return Err(AppError::validation(format!(
                "Unexpected totals: {} cancelled, {} completed",
                summary.cancelled,
                summary.completed()
            )));
        }
        if summary.pool_waits != 1 || summary.pool_wait_max_ms != 35 {
            return Err(AppError::validation(format!(
                "Gate wait lost: {} waits, max {}ms",
                summary.pool_waits, summary.pool_wait_max_ms
            )));
        }
        Ok(())
    })
}
