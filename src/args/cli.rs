use clap::Parser;
use std::time::Duration;

use super::parsers::{
    parse_duration_arg, parse_percentage_arg, parse_positive_u64, parse_positive_usize,
};
use super::types::OutputFormat;

#[derive(Debug, Parser, Clone, Default)]
#[clap(
    version,
    about = "Scenario-driven HTTP load generator: open-workload user injection, session chaining between requests, and latency/error reporting."
)]
pub struct RunArgs {
    /// Simulation file (.toml or .json). Defaults to volley.toml or volley.json in the working directory
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Users for every ramp injection step (and the default ramp profile)
    #[arg(long, env = "USERS", value_parser = parse_positive_u64)]
    pub users: Option<u64>,

    /// Ramp duration for every ramp injection step (supports ms/s/m/h)
    #[arg(long = "ramp-duration", env = "RAMP_DURATION", value_parser = parse_duration_arg)]
    pub ramp_duration: Option<Duration>,

    /// Target base URL; step paths are appended to it
    #[arg(long = "base-url", env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout (supports ms/s/m/h)
    #[arg(long, value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// How long in-flight users may keep running after a stop request
    #[arg(long = "grace-period", value_parser = parse_duration_arg)]
    pub grace_period: Option<Duration>,

    /// Highest tolerated failure rate in percent before the run exits non-zero (default 0)
    #[arg(long = "max-failure-rate", value_parser = parse_percentage_arg)]
    pub max_failure_rate_x100: Option<u64>,

    /// Stop a virtual user's scenario at its first failed request
    #[arg(long = "abort-on-failure")]
    pub abort_on_failure: bool,

    /// Connection pool ceiling shared by all virtual users
    #[arg(long = "max-connections", value_parser = parse_positive_usize)]
    pub max_connections: Option<usize>,

    /// Skip the reachability check against the base URL
    #[arg(long = "no-preflight")]
    pub no_preflight: bool,

    /// Write the summary to this file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<String>,

    /// Summary format
    #[arg(long = "output-format", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}
