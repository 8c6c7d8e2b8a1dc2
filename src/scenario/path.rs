use std::fmt;

use serde_json::Value;

/// Dotted path into a JSON document (`token`, `$.data.items[0].id`), compiled to a
/// JSON pointer once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    pointer: String,
}

impl JsonPath {
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix('$')
            .map_or(trimmed, |rest| rest.strip_prefix('.').unwrap_or(rest));

        let mut pointer = String::with_capacity(body.len().saturating_add(1));
        for segment in body.split('.').filter(|segment| !segment.is_empty()) {
            let (field, indices) = segment
                .find('[')
                .map_or((segment, ""), |idx| segment.split_at(idx));
            if !field.is_empty() {
                push_token(&mut pointer, field);
            }
            for index in indices
                .split(['[', ']'])
                .map(str::trim)
                .filter(|index| !index.is_empty())
            {
                push_token(&mut pointer, index);
            }
        }

        Self {
            source: trimmed.to_owned(),
            pointer,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn lookup<'doc>(&self, document: &'doc Value) -> Option<&'doc Value> {
        document.pointer(&self.pointer)
    }
}

fn push_token(pointer: &mut String, token: &str) {
    pointer.push('/');
    for ch in token.chars() {
        match ch {
            '~' => pointer.push_str("~0"),
            '/' => pointer.push_str("~1"),
            other => pointer.push(other),
        }
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
