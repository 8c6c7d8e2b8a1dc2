use std::path::Path;

use serde_json::Value;

use crate::error::{AppError, AppResult, ConfigError};

use super::FeederRecord;

/// Loads a feeder pool from a JSON file holding an array of flat objects.
///
/// # Errors
///
/// Returns an error when the file cannot be read or is not an array of objects.
pub fn load_records(path: &Path) -> AppResult<Vec<FeederRecord>> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadFeeder {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|err| {
        AppError::config(ConfigError::ParseFeeder {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    parse_records(value)
}

/// Converts an already-parsed JSON document into feeder records.
///
/// # Errors
///
/// Returns an error when the document is not an array of objects.
pub fn parse_records(value: Value) -> AppResult<Vec<FeederRecord>> {
    let Value::Array(rows) = value else {
        return Err(AppError::config(ConfigError::FeederNotArray));
    };
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(object) => Ok(FeederRecord::from_json_object(object)),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_) => {
                Err(AppError::config(ConfigError::FeederRowNotObject {
                    index: index.saturating_add(1),
                }))
            }
        })
        .collect()
}
