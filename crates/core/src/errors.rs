use std::path::PathBuf;

use thiserror::Error;

/// Problems with a bulk input source. Always fatal: nothing is dispatched.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("could not read input source `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("malformed input source `{path}`: {message}")]
    Malformed { path: PathBuf, message: String },
    #[error("input source is missing the required `{0}` column")]
    MissingColumn(&'static str),
    #[error("no valid records (with `id` and `query`) were found in the input")]
    Empty,
    #[error("record {row} is missing an `id`")]
    MissingId { row: usize },
    #[error("record `{id}` (row {row}) is missing a `query`")]
    MissingQuery { row: usize, id: String },
    #[error("duplicate record id `{id}` at row {row}")]
    DuplicateId { row: usize, id: String },
}

impl InputError {
    /// Stable class name used in machine-readable command output.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Read { .. } => "input_read",
            Self::Malformed { .. } | Self::MissingColumn(_) => "input_format",
            Self::Empty => "input_empty",
            Self::MissingId { .. } | Self::MissingQuery { .. } | Self::DuplicateId { .. } => {
                "input_validation"
            }
        }
    }
}
