use std::path::Path;

use serde::Serialize;

use crate::args::OutputFormat;
use crate::config::OutputConfig;
use crate::error::{AppError, AppResult, SinkError};
use crate::metrics::RunSummary;

use super::format::{format_us_as_ms, format_x100, write_line};

#[derive(Debug, Serialize)]
struct SummaryDocument<'summary> {
    simulation: &'summary str,
    passed: bool,
    #[serde(flatten)]
    summary: &'summary RunSummary,
}

/// Writes the summary to the configured file, or stdout when no path is set.
///
/// # Errors
///
/// Returns an error if the summary cannot be rendered or written.
pub async fn write_summary(
    output: &OutputConfig,
    simulation: &str,
    summary: &RunSummary,
    passed: bool,
) -> AppResult<()> {
    let rendered = render_summary(output.format, simulation, summary, passed)?;
    match output.path.as_deref() {
        Some(path) => write_file(path, &rendered).await,
        None => write_stdout(&rendered).await,
    }
}

/// Renders the summary in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization or line formatting fails.
pub fn render_summary(
    format: OutputFormat,
    simulation: &str,
    summary: &RunSummary,
    passed: bool,
) -> AppResult<String> {
    match format {
        OutputFormat::Json => render_json(simulation, summary, passed),
        OutputFormat::Text => render_text(simulation, summary, passed),
    }
}

fn render_json(simulation: &str, summary: &RunSummary, passed: bool) -> AppResult<String> {
    let document = SummaryDocument {
        simulation,
        passed,
        summary,
    };
    let mut json = serde_json::to_string_pretty(&document)
        .map_err(|err| AppError::sink(SinkError::SerializeSummary { source: err }))?;
    json.push('\n');
    Ok(json)
}

fn render_text(simulation: &str, summary: &RunSummary, passed: bool) -> AppResult<String> {
    let mut output = String::new();

    write_line(&mut output, &format!("Simulation: {}", simulation))?;
    write_line(&mut output, &format!("Started: {}", summary.started_at))?;
    write_line(
        &mut output,
        &format!("Duration: {}s", format_x100(summary.duration_ms / 10)),
    )?;
    write_line(
        &mut output,
        &format!(
            "Requests: {} (ok {}, ko {}, cancelled {})",
            summary.count, summary.successes, summary.failures, summary.cancelled
        ),
    )?;
    write_line(
        &mut output,
        &format!("Success rate: {}%", format_x100(summary.success_rate_x100)),
    )?;
    write_line(
        &mut output,
        &format!("Throughput: {} req/s", format_x100(summary.throughput_x100)),
    )?;
    write_line(
        &mut output,
        &format!(
            "Latency (ms): mean {}, p50 {}, p95 {}, p99 {}, max {}",
            format_us_as_ms(summary.mean_us),
            format_us_as_ms(summary.p50_us),
            format_us_as_ms(summary.p95_us),
            format_us_as_ms(summary.p99_us),
            format_us_as_ms(summary.max_us)
        ),
    )?;
    write_line(
        &mut output,
        &format!(
            "Users: started {}, completed {}, aborted {}, cancelled {}",
            summary.users.started,
            summary.users.completed,
            summary.users.aborted,
            summary.users.cancelled
        ),
    )?;
    write_line(
        &mut output,
        &format!(
            "Connection waits: {} (max {} ms)",
            summary.pool_waits, summary.pool_wait_max_ms
        ),
    )?;

    if !summary.requests.is_empty() {
        write_line(&mut output, "Requests by name:")?;
        for request in &summary.requests {
            write_line(
                &mut output,
                &format!(
                    "  {}: count {}, ko {}, cancelled {}, p50 {} ms, p95 {} ms, p99 {} ms",
                    request.name,
                    request.count,
                    request.failures,
                    request.cancelled,
                    format_us_as_ms(request.p50_us),
                    format_us_as_ms(request.p95_us),
                    format_us_as_ms(request.p99_us)
                ),
            )?;
        }
    }

    if !summary.failure_reasons.is_empty() {
        write_line(&mut output, "Failure reasons:")?;
        for (reason, count) in &summary.failure_reasons {
            write_line(&mut output, &format!("  {}: {}", reason, count))?;
        }
    }

    write_line(
        &mut output,
        if passed { "Result: PASSED" } else { "Result: FAILED" },
    )?;
    Ok(output)
}

async fn write_file(path: &Path, rendered: &str) -> AppResult<()> {
    tokio::fs::write(path, rendered).await.map_err(|err| {
        AppError::sink(SinkError::WriteFile {
            path: path.to_path_buf(),
            source: err,
        })
    })
}

async fn write_stdout(rendered: &str) -> AppResult<()> {
    use tokio::io::AsyncWriteExt as _;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(rendered.as_bytes())
        .await
        .map_err(|err| AppError::sink(SinkError::WriteStdout { source: err }))?;
    stdout
        .flush()
        .await
        .map_err(|err| AppError::sink(SinkError::WriteStdout { source: err }))
}
