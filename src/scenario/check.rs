use std::fmt;
use std::sync::OnceLock;

use serde::Deserialize;
use serde_json::Value;

use crate::error::StepError;
use crate::session::{Session, SessionValue, Template};

use super::JsonPath;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssertOp {
    #[default]
    Equals,
    NotEquals,
    Contains,
}

impl AssertOp {
    fn holds(self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Equals => actual == expected,
            Self::NotEquals => actual != expected,
            Self::Contains => actual.contains(expected),
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "is",
            Self::NotEquals => "not",
            Self::Contains => "contains",
        }
    }
}

/// Response rule applied after a request completes. Expected values are templates
/// rendered against the session at check time.
#[derive(Debug, Clone)]
pub enum Check {
    /// Extract a value from the JSON body and save it into the session.
    PathExtract { path: JsonPath, save_as: String },
    /// Extract a value from the JSON body and compare it.
    PathAssert {
        path: JsonPath,
        op: AssertOp,
        expected: Template,
    },
    BodyEquals { expected: Template },
    BodyContains { expected: Template },
    Status { expected: u16 },
}

impl Check {
    #[must_use]
    pub fn extract(path: &str, save_as: &str) -> Self {
        Self::PathExtract {
            path: JsonPath::parse(path),
            save_as: save_as.to_owned(),
        }
    }

    #[must_use]
    pub fn path_is(path: &str, expected: &str) -> Self {
        Self::PathAssert {
            path: JsonPath::parse(path),
            op: AssertOp::Equals,
            expected: Template::parse(expected),
        }
    }

    #[must_use]
    pub fn body_is(expected: &str) -> Self {
        Self::BodyEquals {
            expected: Template::parse(expected),
        }
    }

    fn failed(&self, detail: String) -> StepError {
        StepError::CheckFailed {
            check: self.to_string(),
            detail,
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathExtract { path, save_as } => {
                write!(f, "path({}).saveAs({})", path, save_as)
            }
            Self::PathAssert { path, op, expected } => {
                write!(f, "path({}).{}({})", path, op.as_str(), expected.as_str())
            }
            Self::BodyEquals { expected } => write!(f, "body.is({})", expected.as_str()),
            Self::BodyContains { expected } => {
                write!(f, "body.contains({})", expected.as_str())
            }
            Self::Status { expected } => write!(f, "status.is({})", expected),
        }
    }
}

/// Borrowed view of a completed response. The body is parsed as JSON at most once,
/// and only if a path check needs it.
#[derive(Debug)]
pub struct ResponseView<'body> {
    pub status: u16,
    pub body: &'body str,
    json: OnceLock<Option<Value>>,
}

impl<'body> ResponseView<'body> {
    #[must_use]
    pub const fn new(status: u16, body: &'body str) -> Self {
        Self {
            status,
            body,
            json: OnceLock::new(),
        }
    }

    fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| serde_json::from_str(self.body).ok())
            .as_ref()
    }
}

/// Applies checks in order. Stops at the first failure, so saves declared after a
/// failing check never reach the session.
///
/// # Errors
///
/// Returns the first failing check as [`StepError::CheckFailed`], or
/// [`StepError::UnresolvedPlaceholder`] when an expected-value template cannot render.
pub fn apply_checks(
    checks: &[Check],
    response: &ResponseView<'_>,
    session: &mut Session,
) -> Result<(), StepError> {
    for check in checks {
        match check {
            Check::PathExtract { path, save_as } => {
                let value = lookup(check, path, response)?;
                session.set(save_as.clone(), SessionValue::from_json(value.clone()));
            }
            Check::PathAssert { path, op, expected } => {
                let expected = expected.render(session)?;
                let value = lookup(check, path, response)?;
                let actual = value_text(value);
                if !op.holds(&actual, &expected) {
                    return Err(check.failed(format!("found '{}'", actual)));
                }
            }
            Check::BodyEquals { expected } => {
                let expected = expected.render(session)?;
                if response.body != expected {
                    return Err(check.failed(format!("found '{}'", truncate(response.body))));
                }
            }
            Check::BodyContains { expected } => {
                let expected = expected.render(session)?;
                if !response.body.contains(&expected) {
                    return Err(check.failed("fragment not found in body".to_owned()));
                }
            }
            Check::Status { expected } => {
                if response.status != *expected {
                    return Err(check.failed(format!("found {}", response.status)));
                }
            }
        }
    }
    Ok(())
}

fn lookup<'resp>(
    check: &Check,
    path: &JsonPath,
    response: &'resp ResponseView<'_>,
) -> Result<&'resp Value, StepError> {
    let document = response
        .json()
        .ok_or_else(|| check.failed("response body is not JSON".to_owned()))?;
    path.lookup(document)
        .ok_or_else(|| check.failed(format!("path '{}' not found", path)))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string()
        }
    }
}

/// Bodies echoed into failure reasons are capped.
const MAX_BODY_ECHO: usize = 120;

fn truncate(body: &str) -> &str {
    if body.len() <= MAX_BODY_ECHO {
        return body;
    }
    let mut end = MAX_BODY_ECHO;
    while !body.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    body.get(..end).unwrap_or(body)
}
