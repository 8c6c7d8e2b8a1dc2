use serde::Deserialize;

use crate::args::OutputFormat;
use crate::feeder::FeederPolicy;
use crate::scenario::AssertOp;

/// On-disk simulation definition (`volley.toml` / `volley.json`).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationFile {
    pub name: Option<String>,
    pub base_url: Option<String>,
    /// Extra protocol-level headers as `"Key: Value"`.
    pub headers: Option<Vec<String>>,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub users: Option<u64>,
    pub ramp_duration: Option<DurationValue>,
    pub timeout: Option<DurationValue>,
    pub grace_period: Option<DurationValue>,
    pub max_failure_rate: Option<PercentValue>,
    pub abort_on_failure: Option<bool>,
    pub max_connections: Option<usize>,
    pub preflight: Option<bool>,
    pub output: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub feeder: Option<FeederConfig>,
    #[serde(default)]
    pub injection: Vec<InjectionConfig>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeederConfig {
    pub path: String,
    #[serde(default)]
    pub policy: FeederPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InjectionConfig {
    NothingFor {
        duration: DurationValue,
    },
    AtOnceUsers {
        users: u64,
    },
    RampUsers {
        users: u64,
        during: DurationValue,
    },
    ConstantUsersPerSec {
        rate: u64,
        during: DurationValue,
    },
    RampUsersPerSec {
        from: u64,
        to: u64,
        during: DurationValue,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepConfig {
    Request(RequestConfig),
    Pause { duration: DurationValue },
    Feed,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestConfig {
    pub name: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub headers: Option<Vec<String>>,
    pub body: Option<String>,
    /// Template file read once at load time, relative to the config file.
    pub body_file: Option<String>,
    #[serde(default)]
    pub allow_status: Vec<u16>,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckConfig {
    PathExtract {
        path: String,
        save_as: String,
    },
    PathAssert {
        path: String,
        expected: String,
        #[serde(default)]
        op: AssertOp,
    },
    BodyEquals {
        expected: String,
    },
    BodyContains {
        expected: String,
    },
    Status {
        expected: u16,
    },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

/// `5` means five percent; fractional rates are written as strings (`"0.5"`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PercentValue {
    Whole(u64),
    Text(String),
}
