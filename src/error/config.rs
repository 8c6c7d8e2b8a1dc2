use super::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("No simulation config found (pass --config or create volley.toml).")]
    MissingConfig,
    #[error("No base URL configured (set base_url, --base-url, or BASE_URL).")]
    MissingBaseUrl,
    #[error("Invalid header: {source}")]
    InvalidHeader {
        #[source]
        source: ValidationError,
    },
    #[error("Invalid duration for '{field}': {source}")]
    InvalidDuration {
        field: String,
        #[source]
        source: ValidationError,
    },
    #[error("Scenario must include at least one step.")]
    ScenarioMissingSteps,
    #[error("Step {index} is a request but has no path.")]
    RequestMissingPath { index: usize },
    #[error("Step {index} cannot set both body and body_file.")]
    BodyConflict { index: usize },
    #[error("Step {index} uses an unknown HTTP method '{method}'.")]
    InvalidMethod { index: usize, method: String },
    #[error("Step {index} is a feed step but no [feeder] is configured.")]
    FeedWithoutFeeder { index: usize },
    #[error("Failed to read body file '{path}': {source}")]
    ReadBodyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read feeder '{path}': {source}")]
    ReadFeeder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse feeder '{path}': {source}")]
    ParseFeeder {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Feeder must be a JSON array of objects.")]
    FeederNotArray,
    #[error("Feeder row {index} is not a JSON object.")]
    FeederRowNotObject { index: usize },
    #[error("Invalid max_failure_rate: {source}")]
    InvalidFailureRate {
        #[source]
        source: ValidationError,
    },
    #[error("Config '{field}' must be >= 1.")]
    FieldMustBePositive { field: &'static str },
}
