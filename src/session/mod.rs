//! Per-virtual-user state carried between scenario steps.
mod template;


use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::StepError;
use crate::feeder::FeederRecord;

pub use template::Template;

/// A value stored in a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    Str(String),
    Number(serde_json::Number),
    /// Raw JSON fragment (object, array, bool, or null), rendered compactly.
    Json(Value),
}

impl SessionValue {
    /// Converts an extracted or fed JSON value, keeping strings and numbers typed.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Str(text),
            Value::Number(number) => Self::Number(number),
            other @ (Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_)) => {
                Self::Json(other)
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(text) => Some(text),
            Self::Number(_) | Self::Json(_) => None,
        }
    }

    pub(crate) fn render_into(&self, output: &mut String) {
        match self {
            Self::Str(text) => output.push_str(text),
            Self::Number(number) => output.push_str(&number.to_string()),
            Self::Json(value) => output.push_str(&value.to_string()),
        }
    }
}

impl fmt::Display for SessionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{}", number),
            Self::Json(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for SessionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for SessionValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for SessionValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<u64> for SessionValue {
    fn from(value: u64) -> Self {
        Self::Number(value.into())
    }
}

/// Key-value store owned by exactly one virtual user for the length of its run.
#[derive(Debug, Default)]
pub struct Session {
    user_id: u64,
    values: HashMap<String, SessionValue>,
}

impl Session {
    #[must_use]
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            values: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> u64 {
        self.user_id
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.values.get(key)
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<SessionValue>,
    {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Applies every field of a feeder record. The record is fully typed before
    /// this point, so insertion cannot fail half-way.
    pub fn merge(&mut self, record: &FeederRecord) {
        self.values.reserve(record.len());
        for (key, value) in record.iter() {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Substitutes `#{key}` placeholders with current values.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::UnresolvedPlaceholder`] when a referenced key is absent.
    pub fn render(&self, template: &str) -> Result<String, StepError> {
        Template::parse(template).render(self)
    }
}
