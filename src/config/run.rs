use std::path::PathBuf;
use std::time::Duration;

use crate::args::OutputFormat;

pub const DEFAULT_USERS: u64 = 5;
pub const DEFAULT_RAMP_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// Resolved run parameters after CLI, environment, file, and defaults are layered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub users: u64,
    pub ramp_duration: Duration,
    pub base_url: String,
    pub request_timeout: Duration,
    pub grace_period: Duration,
    /// Hundredths of a percent; `0` fails the run on any failed request.
    pub max_failure_rate_x100: u64,
    pub abort_on_failure: bool,
    pub max_connections: usize,
    pub preflight: bool,
    pub default_headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputConfig {
    pub path: Option<PathBuf>,
    pub format: OutputFormat,
}
