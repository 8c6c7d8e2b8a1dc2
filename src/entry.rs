use std::ffi::OsString;
use std::path::Path;

use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;

use crate::app::{RunOutcome, run_local};
use crate::args::RunArgs;
use crate::config::{DEFAULT_CONFIG_FILES, build_simulation, load_config};
use crate::error::{AppError, AppResult};
use crate::exit_codes::ExitCode;

/// Parses arguments, runs the simulation, and maps the result to an exit code.
#[must_use]
pub fn run() -> ExitCode {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::Success,
        Err(code) => return code,
    };

    crate::logger::init_logging(args.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("Failed to build runtime: {}", err);
            return ExitCode::RuntimeError;
        }
    };

    match runtime.block_on(run_async(&args)) {
        Ok(outcome) => ExitCode::from_verdict(outcome.passed),
        Err(err) => {
            tracing::error!("{}", err);
            if err.is_setup_error() {
                ExitCode::InvalidInput
            } else {
                ExitCode::RuntimeError
            }
        }
    }
}

fn parse_args() -> Result<Option<RunArgs>, ExitCode> {
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        let mut cmd = RunArgs::command();
        if let Err(err) = cmd.print_help() {
            eprintln!("Failed to print help: {}", err);
            return Err(ExitCode::RuntimeError);
        }
        println!();
        return Ok(None);
    }

    match RunArgs::try_parse_from(raw_args) {
        Ok(args) => Ok(Some(args)),
        Err(err) => {
            drop(err.print());
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                Ok(None)
            } else {
                Err(ExitCode::InvalidInput)
            }
        }
    }
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    if !treat_as_empty {
        return false;
    }

    !has_default_config()
}

fn has_default_config() -> bool {
    DEFAULT_CONFIG_FILES
        .iter()
        .any(|path| Path::new(path).exists())
}

async fn run_async(args: &RunArgs) -> AppResult<RunOutcome> {
    let loaded = load_config(args.config.as_deref())?;
    let simulation = build_simulation(args, &loaded.file, &loaded.base_dir)?;
    run_local(simulation).await
}
