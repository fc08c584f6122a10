//! Static HTML viewer for bulk result artifacts.

pub mod browser;
pub mod render;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use recipebot_bulk::persist::{latest_artifact, read_artifact};
use recipebot_bulk::PersistError;
use thiserror::Error;
use tracing::{info, warn};

pub use browser::{file_url, open_in_browser};
pub use render::ConversationRenderer;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("artifact `{0}` does not exist")]
    NotFound(PathBuf),
    #[error("no result artifacts found in `{0}`")]
    NoArtifacts(PathBuf),
    #[error("could not scan results directory `{path}`: {source}")]
    Scan { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Artifact(#[from] PersistError),
    #[error("template error: {0}")]
    Template(String),
    #[error("could not write viewer `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not open browser: {0}")]
    Browser(String),
}

/// `viewer_<artifact stem>.html`, next to the artifact.
pub fn viewer_path(artifact: &Path) -> PathBuf {
    let stem = artifact.file_stem().map(|stem| stem.to_string_lossy()).unwrap_or_default();
    artifact.with_file_name(format!("viewer_{stem}.html"))
}

/// Uses `requested` when given, otherwise the newest artifact in
/// `results_dir`.
pub fn resolve_artifact(
    requested: Option<&Path>,
    results_dir: &Path,
) -> Result<PathBuf, ViewerError> {
    if let Some(path) = requested {
        if !path.is_file() {
            return Err(ViewerError::NotFound(path.to_path_buf()));
        }
        return Ok(path.to_path_buf());
    }

    if !results_dir.is_dir() {
        return Err(ViewerError::NoArtifacts(results_dir.to_path_buf()));
    }
    latest_artifact(results_dir)
        .map_err(|source| ViewerError::Scan { path: results_dir.to_path_buf(), source })?
        .ok_or_else(|| ViewerError::NoArtifacts(results_dir.to_path_buf()))
}

/// Renders `artifact` and writes the viewer next to it.
///
/// Returns `None` without writing anything when the artifact has no rows.
pub fn create_viewer(artifact: &Path) -> Result<Option<PathBuf>, ViewerError> {
    let results = read_artifact(artifact)?;
    if results.is_empty() {
        warn!(
            event_name = "viewer.artifact.empty",
            path = %artifact.display(),
            "artifact has no conversations; no viewer written"
        );
        return Ok(None);
    }

    let source = artifact
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let html = ConversationRenderer::new()?.render(&results, &source)?;

    let output = viewer_path(artifact);
    fs::write(&output, html)
        .map_err(|source| ViewerError::Write { path: output.clone(), source })?;
    info!(
        event_name = "viewer.written",
        path = %output.display(),
        pages = results.len(),
        "viewer written"
    );
    Ok(Some(output))
}
