use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::InputError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One unit of bulk work: an opening query plus scripted follow-ups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub id: RecordId,
    pub initial_query: String,
    pub followups: Vec<String>,
}

impl InputRecord {
    pub fn new(id: impl Into<String>, initial_query: impl Into<String>) -> Self {
        Self { id: RecordId(id.into()), initial_query: initial_query.into(), followups: Vec::new() }
    }

    pub fn with_followups<I, S>(mut self, followups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.followups = followups.into_iter().map(Into::into).collect();
        self
    }

    /// Number of agent calls this record needs when every turn succeeds.
    pub fn turn_count(&self) -> usize {
        1 + self.followups.len()
    }
}

/// Checks a batch before any work is dispatched.
///
/// Row numbers in errors are 1-based positions within `records`.
pub fn validate_records(records: &[InputRecord]) -> Result<(), InputError> {
    if records.is_empty() {
        return Err(InputError::Empty);
    }

    let mut seen = HashSet::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let row = index + 1;
        if record.id.0.trim().is_empty() {
            return Err(InputError::MissingId { row });
        }
        if record.initial_query.trim().is_empty() {
            return Err(InputError::MissingQuery { row, id: record.id.0.clone() });
        }
        if !seen.insert(record.id.0.as_str()) {
            return Err(InputError::DuplicateId { row, id: record.id.0.clone() });
        }
    }

    Ok(())
}
