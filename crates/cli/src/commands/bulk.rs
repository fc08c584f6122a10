use std::path::PathBuf;
use std::sync::Arc;

use recipebot_agent::{AgentRuntime, ChatAgent, ConversationRunner};
use recipebot_bulk::{
    read_records, BulkDispatcher, ConsoleProgress, DispatchError, ProgressReporter,
    ResultPersister,
};
use recipebot_core::config::AppConfig;
use tracing::info;

use crate::commands::{CommandResult, EXIT_INPUT, EXIT_PERSIST, EXIT_RUNTIME};

const COMMAND: &str = "bulk";

#[derive(Clone, Debug, Default)]
pub struct BulkArgs {
    pub csv: Option<PathBuf>,
    pub workers: Option<usize>,
    pub results_dir: Option<PathBuf>,
}

pub async fn run(config: &AppConfig, args: &BulkArgs) -> CommandResult {
    let runtime = match AgentRuntime::from_config(config) {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(COMMAND, "runtime_init", error.to_string(), EXIT_RUNTIME)
        }
    };
    run_with_agent(config, args, runtime, Arc::new(ConsoleProgress::stdout())).await
}

/// Reads the input source, dispatches every record through `agent`, and
/// persists the artifact. Command-line values win over configuration.
pub async fn run_with_agent<A>(
    config: &AppConfig,
    args: &BulkArgs,
    agent: A,
    progress: Arc<dyn ProgressReporter>,
) -> CommandResult
where
    A: ChatAgent + 'static,
{
    let input = args.csv.clone().unwrap_or_else(|| config.bulk.input_path.clone());
    let workers = args.workers.unwrap_or(config.bulk.workers);
    let results_dir =
        args.results_dir.clone().unwrap_or_else(|| config.bulk.results_dir.clone());

    let records = match read_records(&input) {
        Ok(records) => records,
        Err(error) => {
            return CommandResult::failure(COMMAND, error.class(), error.to_string(), EXIT_INPUT)
        }
    };
    info!(
        event_name = "cli.bulk.input_loaded",
        path = %input.display(),
        records = records.len(),
        workers,
        "bulk input loaded"
    );

    let runner = Arc::new(ConversationRunner::new(agent));
    let dispatcher = BulkDispatcher::new(runner, workers, progress);
    let results = match dispatcher.dispatch(records).await {
        Ok(results) => results,
        Err(DispatchError::Input(error)) => {
            return CommandResult::failure(COMMAND, error.class(), error.to_string(), EXIT_INPUT)
        }
        Err(error @ DispatchError::ZeroConcurrency) => {
            return CommandResult::config_failure(COMMAND, error)
        }
    };

    let failed = results.iter().filter(|result| !result.is_ok()).count();
    match ResultPersister::new(&results_dir).persist(&results) {
        Ok(path) => {
            let mut summary = format!("Saved {} results to {}", results.len(), path.display());
            if failed > 0 {
                summary.push_str(&format!(" ({failed} ended in error)"));
            }
            CommandResult::text(summary)
        }
        Err(error) => {
            CommandResult::failure(COMMAND, "persistence", error.to_string(), EXIT_PERSIST)
        }
    }
}
