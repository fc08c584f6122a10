use std::path::PathBuf;

use recipebot_core::config::AppConfig;
use recipebot_viewer::{create_viewer, open_in_browser, resolve_artifact, ViewerError};
use tracing::warn;

use crate::commands::{CommandResult, EXIT_VIEWER};

const COMMAND: &str = "view";

#[derive(Clone, Debug, Default)]
pub struct ViewArgs {
    /// Artifact to render; the newest one in the results directory otherwise.
    pub path: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub open: bool,
}

pub async fn run(config: &AppConfig, args: &ViewArgs) -> CommandResult {
    let results_dir =
        args.results_dir.clone().unwrap_or_else(|| config.bulk.results_dir.clone());

    let artifact = match resolve_artifact(args.path.as_deref(), &results_dir) {
        Ok(artifact) => artifact,
        Err(error) => return failure(error),
    };

    let output = match create_viewer(&artifact) {
        Ok(Some(output)) => output,
        Ok(None) => {
            return CommandResult::text(format!(
                "Artifact {} has no conversations; no viewer written",
                artifact.display()
            ))
        }
        Err(error) => return failure(error),
    };

    let mut message = format!("Viewer written to {}", output.display());
    if args.open {
        if let Err(error) = open_in_browser(&output).await {
            warn!(event_name = "cli.view.browser_failed", error = %error, "could not open browser");
            message.push_str(&format!(" (could not open browser: {error})"));
        }
    }
    CommandResult::text(message)
}

fn failure(error: ViewerError) -> CommandResult {
    match error {
        ViewerError::Artifact(_) => {
            CommandResult::failure(COMMAND, "artifact_read", error.to_string(), EXIT_VIEWER)
        }
        ViewerError::NotFound(_) | ViewerError::NoArtifacts(_) => {
            CommandResult::failure(COMMAND, "artifact_missing", error.to_string(), EXIT_VIEWER)
        }
        _ => CommandResult::failure(COMMAND, "viewer", error.to_string(), EXIT_VIEWER),
    }
}
