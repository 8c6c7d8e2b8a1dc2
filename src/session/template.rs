use std::sync::Arc;

use crate::error::StepError;

use super::Session;

const OPEN: &str = "#{";
const CLOSE: char = '}';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Key(String),
}

/// A `#{key}` template, split into literal and placeholder parts once at setup.
///
/// Substituted values are inserted verbatim and never re-scanned, so a value that
/// itself contains `#{...}` or percent escapes is not expanded or encoded twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: Arc<str>,
    parts: Vec<Part>,
}

impl Template {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        loop {
            let Some(start) = rest.find(OPEN) else {
                literal.push_str(rest);
                break;
            };
            let (before, after_start) = rest.split_at(start);
            literal.push_str(before);
            let after = after_start.get(OPEN.len()..).unwrap_or_default();
            let Some(end) = after.find(CLOSE) else {
                // Unterminated placeholder stays literal.
                literal.push_str(after_start);
                break;
            };
            let (key_part, after_end) = after.split_at(end);
            if key_part.contains(OPEN) {
                // Stray opener: keep it and rescan from the inner one.
                literal.push_str(OPEN);
                rest = after;
                continue;
            }
            let key = key_part.trim();
            if is_key(key) {
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Key(key.to_owned()));
            } else {
                literal.push_str(OPEN);
                literal.push_str(key_part);
                literal.push(CLOSE);
            }
            rest = after_end.get(CLOSE.len_utf8()..).unwrap_or_default();
        }

        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }

        Self {
            source: Arc::from(input),
            parts,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Shared handle to the unrendered text.
    #[must_use]
    pub fn shared_source(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.parts.iter().all(|part| matches!(part, Part::Literal(_)))
    }

    /// Keys referenced by this template, in order of appearance.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Key(key) => Some(key.as_str()),
            Part::Literal(_) => None,
        })
    }

    /// Renders against a session.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::UnresolvedPlaceholder`] for the first key the session lacks.
    pub fn render(&self, session: &Session) -> Result<String, StepError> {
        let mut output = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => output.push_str(text),
                Part::Key(key) => {
                    let value = session
                        .get(key)
                        .ok_or_else(|| StepError::UnresolvedPlaceholder { key: key.clone() })?;
                    value.render_into(&mut output);
                }
            }
        }
        Ok(output)
    }
}

fn is_key(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.'))
}

impl From<&str> for Template {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
