//! Result artifacts: one CSV per bulk run, named after the moment it was
//! written, holding `id`, `query`, and the full conversation as JSON.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use recipebot_core::{Conversation, RecordId, RunResult};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

pub const ARTIFACT_HEADER: [&str; 3] = ["id", "query", "conversation_history"];
pub const ARTIFACT_PREFIX: &str = "results_";
pub const ARTIFACT_EXTENSION: &str = "csv";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("could not create results directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("could not encode result `{id}`: {message}")]
    Encode { id: String, message: String },
    #[error("could not write artifact `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not read artifact `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed artifact `{path}`: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// `results_<YYYYmmdd_HHMMSS>.csv` for the given local time.
pub fn artifact_file_name(timestamp: DateTime<Local>) -> String {
    format!("{ARTIFACT_PREFIX}{}.{ARTIFACT_EXTENSION}", timestamp.format("%Y%m%d_%H%M%S"))
}

#[derive(Clone, Debug)]
pub struct ResultPersister {
    results_dir: PathBuf,
}

impl ResultPersister {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self { results_dir: results_dir.into() }
    }

    pub fn persist(&self, results: &[RunResult]) -> Result<PathBuf, PersistError> {
        self.persist_at(results, Local::now())
    }

    /// Writes the artifact for `timestamp`. A second run within the same
    /// second replaces the earlier file.
    pub fn persist_at(
        &self,
        results: &[RunResult],
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf, PersistError> {
        fs::create_dir_all(&self.results_dir).map_err(|source| PersistError::CreateDir {
            path: self.results_dir.clone(),
            source,
        })?;

        let path = self.results_dir.join(artifact_file_name(timestamp));
        write_artifact(&path, results)?;
        info!(
            event_name = "bulk.artifact.saved",
            path = %path.display(),
            rows = results.len(),
            "saved result artifact"
        );
        Ok(path)
    }
}

/// Encodes every row before touching the file system, so an encoding
/// failure leaves no partial artifact behind.
pub fn write_artifact(path: &Path, results: &[RunResult]) -> Result<(), PersistError> {
    let write_error = |error: csv::Error| PersistError::Write {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, error.to_string()),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ARTIFACT_HEADER).map_err(write_error)?;
    for result in results {
        let history = result.conversation.to_json().map_err(|error| PersistError::Encode {
            id: result.id.0.clone(),
            message: error.to_string(),
        })?;
        writer
            .write_record([result.id.0.as_str(), result.initial_query.as_str(), history.as_str()])
            .map_err(write_error)?;
    }
    let bytes = writer.into_inner().map_err(|error| PersistError::Write {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, error.to_string()),
    })?;

    fs::write(path, bytes).map_err(|source| PersistError::Write { path: path.to_path_buf(), source })
}

#[derive(Debug, Deserialize)]
struct ArtifactRow {
    id: String,
    query: String,
    conversation_history: String,
}

pub fn read_artifact(path: &Path) -> Result<Vec<RunResult>, PersistError> {
    let file = fs::File::open(path)
        .map_err(|source| PersistError::Read { path: path.to_path_buf(), source })?;
    let malformed = |message: String| PersistError::Malformed { path: path.to_path_buf(), message };

    let mut reader = csv::Reader::from_reader(file);
    let mut results = Vec::new();
    for (index, row) in reader.deserialize::<ArtifactRow>().enumerate() {
        let row = row.map_err(|error| malformed(error.to_string()))?;
        let conversation = Conversation::from_json(&row.conversation_history).map_err(|error| {
            malformed(format!("row {}: invalid conversation_history: {error}", index + 1))
        })?;
        results.push(RunResult::from_persisted(RecordId(row.id), row.query, conversation));
    }
    Ok(results)
}

pub fn is_artifact(path: &Path) -> bool {
    let has_prefix = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(ARTIFACT_PREFIX));
    let has_extension =
        path.extension().and_then(|extension| extension.to_str()) == Some(ARTIFACT_EXTENSION);
    has_prefix && has_extension
}

/// Most recently modified artifact in `dir`, if any.
pub fn latest_artifact(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_artifact(&path) || !entry.file_type()?.is_file() {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        if latest.as_ref().map_or(true, |(newest, _)| modified > *newest) {
            latest = Some((modified, path));
        }
    }
    Ok(latest.map(|(_, path)| path))
}
