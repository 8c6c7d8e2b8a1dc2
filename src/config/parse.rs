use std::time::Duration;

use crate::args::parsers::{parse_duration, parse_percentage_x100};
use crate::error::{ConfigError, ValidationError};

use super::types::{DurationValue, PercentValue};

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            Self::Seconds(0) => Err(ValidationError::DurationZero),
            Self::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            Self::Text(text) => parse_duration(text),
        }
    }
}

impl PercentValue {
    pub(crate) fn to_x100(&self) -> Result<u64, ValidationError> {
        match self {
            Self::Whole(percent) => parse_percentage_x100(&percent.to_string()),
            Self::Text(text) => parse_percentage_x100(text),
        }
    }
}

pub(crate) fn duration_field(field: &str, value: &DurationValue) -> Result<Duration, ConfigError> {
    value
        .to_duration()
        .map_err(|source| ConfigError::InvalidDuration {
            field: field.to_owned(),
            source,
        })
}
