//! Immutable scenario definitions shared by every virtual user.
mod check;
mod path;


use std::fmt;
use std::time::Duration;

use crate::args::HttpMethod;
use crate::session::Template;

pub use check::{AssertOp, Check, ResponseView, apply_checks};
pub use path::JsonPath;

/// An ordered journey walked once per virtual user.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Number of request steps, i.e. outcomes emitted by a user that completes the chain.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step, Step::Request(_)))
            .count()
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Request(Box<RequestStep>),
    /// Suspend this user only.
    Pause(Duration),
    /// Pull one feeder record and merge it into the session.
    Feed,
}

#[derive(Debug, Clone)]
pub struct RequestStep {
    /// Display name; may reference session keys. Reports group by the raw template.
    pub name: Template,
    pub method: HttpMethod,
    /// Path relative to the base URL, or an absolute `http(s)://` URL.
    pub path: Template,
    pub headers: Vec<(String, Template)>,
    pub body: Option<Template>,
    pub checks: Vec<Check>,
    /// Non-2xx statuses that still count as success.
    pub allow_status: Vec<u16>,
}

impl RequestStep {
    #[must_use]
    pub fn new(name: &str, method: HttpMethod, path: &str) -> Self {
        Self {
            name: Template::parse(name),
            method,
            path: Template::parse(path),
            headers: Vec::new(),
            body: None,
            checks: Vec::new(),
            allow_status: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), Template::parse(value)));
        self
    }

    #[must_use]
    pub fn body(mut self, body: &str) -> Self {
        self.body = Some(Template::parse(body));
        self
    }

    #[must_use]
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    #[must_use]
    pub fn status_allowed(&self, status: u16) -> bool {
        (200..300).contains(&status) || self.allow_status.contains(&status)
    }
}

impl fmt::Display for RequestStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path.as_str())
    }
}
