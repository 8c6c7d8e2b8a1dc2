use std::path::Path;
use std::sync::Arc;

use crate::args::{HttpMethod, RunArgs, parsers::parse_header};
use crate::error::{AppError, AppResult, ConfigError};
use crate::feeder::{Feeder, load_records};
use crate::injector::{InjectionSchedule, InjectionStep};
use crate::scenario::{Check, JsonPath, RequestStep, Scenario, Step};
use crate::session::Template;

use super::parse::duration_field;
use super::run::{
    DEFAULT_GRACE_PERIOD, DEFAULT_MAX_CONNECTIONS, DEFAULT_RAMP_DURATION,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_USERS, OutputConfig, RunConfig,
};
use super::types::{CheckConfig, InjectionConfig, RequestConfig, SimulationFile, StepConfig};

const DEFAULT_SIMULATION_NAME: &str = "simulation";

/// Everything a run needs, resolved and validated before any user starts.
#[derive(Debug)]
pub struct Simulation {
    pub name: String,
    pub run: RunConfig,
    pub scenario: Arc<Scenario>,
    pub injection: Vec<InjectionStep>,
    pub schedule: InjectionSchedule,
    pub feeder: Option<Arc<Feeder>>,
    pub output: OutputConfig,
}

/// Layers CLI/env arguments over the simulation file and builds the domain model.
/// Relative feeder and body-file paths resolve against `base_dir`.
///
/// # Errors
///
/// Returns an error when the file is incomplete or inconsistent, a referenced
/// file cannot be loaded, or the injection profile is invalid.
pub fn build_simulation(
    args: &RunArgs,
    file: &SimulationFile,
    base_dir: &Path,
) -> AppResult<Simulation> {
    let run = resolve_run_config(args, file)?;

    let feeder = match file.feeder.as_ref() {
        Some(config) => {
            let records = load_records(&base_dir.join(&config.path))?;
            Some(Arc::new(Feeder::new(records, config.policy)))
        }
        None => None,
    };

    let steps = file
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| build_step(index.saturating_add(1), step, feeder.is_some(), base_dir))
        .collect::<AppResult<Vec<_>>>()?;
    if steps.is_empty() {
        return Err(AppError::config(ConfigError::ScenarioMissingSteps));
    }

    let injection = resolve_injection(args, file, &run)?;
    let schedule = InjectionSchedule::build(&injection)?;

    let name = file
        .name
        .clone()
        .unwrap_or_else(|| DEFAULT_SIMULATION_NAME.to_owned());
    let output = OutputConfig {
        path: args
            .output
            .clone()
            .or_else(|| file.output.clone())
            .map(Into::into),
        format: args.output_format.or(file.output_format).unwrap_or_default(),
    };

    Ok(Simulation {
        scenario: Arc::new(Scenario {
            name: name.clone(),
            steps,
        }),
        name,
        run,
        injection,
        schedule,
        feeder,
        output,
    })
}

fn resolve_run_config(args: &RunArgs, file: &SimulationFile) -> AppResult<RunConfig> {
    let users = args.users.or(file.users).unwrap_or(DEFAULT_USERS);
    if users == 0 {
        return Err(AppError::config(ConfigError::FieldMustBePositive { field: "users" }));
    }
    let ramp_duration = match (args.ramp_duration, file.ramp_duration.as_ref()) {
        (Some(duration), _) => duration,
        (None, Some(value)) => duration_field("ramp_duration", value)?,
        (None, None) => DEFAULT_RAMP_DURATION,
    };
    let request_timeout = match (args.timeout, file.timeout.as_ref()) {
        (Some(duration), _) => duration,
        (None, Some(value)) => duration_field("timeout", value)?,
        (None, None) => DEFAULT_REQUEST_TIMEOUT,
    };
    let grace_period = match (args.grace_period, file.grace_period.as_ref()) {
        (Some(duration), _) => duration,
        (None, Some(value)) => duration_field("grace_period", value)?,
        (None, None) => DEFAULT_GRACE_PERIOD,
    };
    let max_failure_rate_x100 = match (args.max_failure_rate_x100, file.max_failure_rate.as_ref())
    {
        (Some(rate), _) => rate,
        (None, Some(value)) => value
            .to_x100()
            .map_err(|source| AppError::config(ConfigError::InvalidFailureRate { source }))?,
        (None, None) => 0,
    };
    let max_connections = args
        .max_connections
        .or(file.max_connections)
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);
    if max_connections == 0 {
        return Err(AppError::config(ConfigError::FieldMustBePositive {
            field: "max_connections",
        }));
    }

    let base_url = args
        .base_url
        .clone()
        .or_else(|| file.base_url.clone())
        .ok_or_else(|| AppError::config(ConfigError::MissingBaseUrl))?;

    let mut default_headers = Vec::new();
    if let Some(accept) = file.accept.as_ref() {
        default_headers.push(("Accept".to_owned(), accept.clone()));
    }
    if let Some(content_type) = file.content_type.as_ref() {
        default_headers.push(("Content-Type".to_owned(), content_type.clone()));
    }
    for header in file.headers.iter().flatten() {
        default_headers.push(parse_header(header).map_err(|source| {
            AppError::config(ConfigError::InvalidHeader { source })
        })?);
    }

    Ok(RunConfig {
        users,
        ramp_duration,
        base_url,
        request_timeout,
        grace_period,
        max_failure_rate_x100,
        abort_on_failure: args.abort_on_failure || file.abort_on_failure.unwrap_or(false),
        max_connections,
        preflight: !args.no_preflight && file.preflight.unwrap_or(true),
        default_headers,
    })
}

/// With no `[[injection]]` the profile is one ramp over the run's users. An
/// explicit user count or ramp duration from the CLI or environment overrides
/// every ramp step in the file.
fn resolve_injection(
    args: &RunArgs,
    file: &SimulationFile,
    run: &RunConfig,
) -> AppResult<Vec<InjectionStep>> {
    if file.injection.is_empty() {
        return Ok(vec![InjectionStep::RampUsers {
            users: run.users,
            during: run.ramp_duration,
        }]);
    }

    file.injection
        .iter()
        .map(|step| {
            let step = match step {
                InjectionConfig::NothingFor { duration } => {
                    InjectionStep::NothingFor(duration_field("nothing_for.duration", duration)?)
                }
                InjectionConfig::AtOnceUsers { users } => InjectionStep::AtOnceUsers(*users),
                InjectionConfig::RampUsers { users, during } => InjectionStep::RampUsers {
                    users: args.users.unwrap_or(*users),
                    during: match args.ramp_duration {
                        Some(duration) => duration,
                        None => duration_field("ramp_users.during", during)?,
                    },
                },
                InjectionConfig::ConstantUsersPerSec { rate, during } => {
                    InjectionStep::ConstantUsersPerSec {
                        rate: *rate,
                        during: duration_field("constant_users_per_sec.during", during)?,
                    }
                }
                InjectionConfig::RampUsersPerSec { from, to, during } => {
                    InjectionStep::RampUsersPerSec {
                        from: *from,
                        to: *to,
                        during: duration_field("ramp_users_per_sec.during", during)?,
                    }
                }
            };
            Ok(step)
        })
        .collect::<Result<Vec<_>, ConfigError>>()
        .map_err(AppError::config)
}

fn build_step(index: usize, step: &StepConfig, has_feeder: bool, base_dir: &Path) -> AppResult<Step> {
    match step {
        StepConfig::Request(request) => Ok(Step::Request(Box::new(build_request(
            index, request, base_dir,
        )?))),
        StepConfig::Pause { duration } => Ok(Step::Pause(duration_field(
            &format!("steps[{}].duration", index),
            duration,
        )?)),
        StepConfig::Feed if has_feeder => Ok(Step::Feed),
        StepConfig::Feed => Err(AppError::config(ConfigError::FeedWithoutFeeder { index })),
    }
}

fn build_request(index: usize, config: &RequestConfig, base_dir: &Path) -> AppResult<RequestStep> {
    let path = config
        .path
        .as_deref()
        .ok_or_else(|| AppError::config(ConfigError::RequestMissingPath { index }))?;
    let method = match config.method.as_deref() {
        Some(method) => method.parse::<HttpMethod>().map_err(|_unknown| {
            AppError::config(ConfigError::InvalidMethod {
                index,
                method: method.to_owned(),
            })
        })?,
        None => HttpMethod::Get,
    };
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| format!("{} {}", method.as_str(), path));

    let body = match (config.body.as_deref(), config.body_file.as_deref()) {
        (Some(_), Some(_)) => return Err(AppError::config(ConfigError::BodyConflict { index })),
        (Some(body), None) => Some(Template::parse(body)),
        (None, Some(body_file)) => {
            let body_path = base_dir.join(body_file);
            let content = std::fs::read_to_string(&body_path).map_err(|source| {
                AppError::config(ConfigError::ReadBodyFile {
                    path: body_path.clone(),
                    source,
                })
            })?;
            Some(Template::parse(&content))
        }
        (None, None) => None,
    };

    let mut step = RequestStep::new(&name, method, path);
    for header in config.headers.iter().flatten() {
        let (header_name, value) = parse_header(header)
            .map_err(|source| AppError::config(ConfigError::InvalidHeader { source }))?;
        step = step.header(&header_name, &value);
    }
    step.body = body;
    step.allow_status.clone_from(&config.allow_status);
    step.checks = config.checks.iter().map(build_check).collect();
    Ok(step)
}

fn build_check(config: &CheckConfig) -> Check {
    match config {
        CheckConfig::PathExtract { path, save_as } => Check::extract(path, save_as),
        CheckConfig::PathAssert { path, expected, op } => Check::PathAssert {
            path: JsonPath::parse(path),
            op: *op,
            expected: Template::parse(expected),
        },
        CheckConfig::BodyEquals { expected } => Check::body_is(expected),
        CheckConfig::BodyContains { expected } => Check::BodyContains {
            expected: Template::parse(expected),
        },
        CheckConfig::Status { expected } => Check::Status {
            expected: *expected,
        },
    }
}
