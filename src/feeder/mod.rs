//! Shared pool of test-data records handed out to virtual users.
mod loader;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::Deserialize;

use crate::error::StepError;
use crate::session::SessionValue;

pub use loader::{load_records, parse_records};

/// How records are drawn from the pool.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeederPolicy {
    /// Pool order; fails once every record was issued.
    #[default]
    Sequential,
    /// Uniform draw with replacement, bounded by the pool size in total issues.
    Random,
    /// Pool order, wrapping forever.
    Circular,
}

impl FeederPolicy {
    #[must_use]
    pub const fn exhausts(self) -> bool {
        matches!(self, Self::Sequential | Self::Random)
    }
}

/// One immutable row of test data. Cloning is cheap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeederRecord {
    fields: Arc<BTreeMap<String, SessionValue>>,
}

impl FeederRecord {
    #[must_use]
    pub fn new(fields: BTreeMap<String, SessionValue>) -> Self {
        Self {
            fields: Arc::new(fields),
        }
    }

    #[must_use]
    pub fn from_json_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::new(
            object
                .into_iter()
                .map(|(key, value)| (key, SessionValue::from_json(value)))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SessionValue> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SessionValue)> {
        self.fields.iter()
    }
}

/// Concurrency-safe record source. The cursor is a single atomic counter, so every
/// call claims a distinct issue slot and no record is handed out twice under
/// `Sequential`.
#[derive(Debug)]
pub struct Feeder {
    records: Vec<FeederRecord>,
    policy: FeederPolicy,
    cursor: AtomicUsize,
}

impl Feeder {
    #[must_use]
    pub const fn new(records: Vec<FeederRecord>, policy: FeederPolicy) -> Self {
        Self {
            records,
            policy,
            cursor: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub const fn policy(&self) -> FeederPolicy {
        self.policy
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.records.len()
    }

    /// Draws the next record per the consumption policy.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::FeederExhausted`] when the pool is empty, or when a
    /// non-circular policy has already issued `pool_size` records.
    pub fn next(&self) -> Result<FeederRecord, StepError> {
        let len = self.records.len();
        if len == 0 {
            return Err(StepError::FeederExhausted);
        }

        let slot = self.claim_slot(len)?;
        let index = match self.policy {
            FeederPolicy::Sequential => slot,
            FeederPolicy::Circular => slot.checked_rem(len).unwrap_or(0),
            FeederPolicy::Random => rand::thread_rng().gen_range(0..len),
        };
        self.records
            .get(index)
            .cloned()
            .ok_or(StepError::FeederExhausted)
    }

    fn claim_slot(&self, len: usize) -> Result<usize, StepError> {
        if !self.policy.exhausts() {
            // Wrapping add keeps the circular cursor valid forever.
            return Ok(self.cursor.fetch_add(1, Ordering::Relaxed));
        }
        loop {
            let current = self.cursor.load(Ordering::Relaxed);
            if current >= len {
                return Err(StepError::FeederExhausted);
            }
            let next = current.saturating_add(1);
            if self
                .cursor
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return Ok(current);
            }
        }
    }
}
