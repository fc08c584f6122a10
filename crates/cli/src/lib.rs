pub mod commands;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use recipebot_core::config::{AppConfig, ConfigError, LoadOptions, LogFormat, LoggingConfig};

use crate::commands::ask::AskArgs;
use crate::commands::bulk::BulkArgs;
use crate::commands::view::ViewArgs;
use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "recipebot",
    about = "Recipe assistant operator CLI",
    long_about = "Run bulk recipe conversations, browse their transcripts, and inspect configuration.",
    after_help = "Examples:\n  recipebot bulk --csv data/sample_queries.csv --workers 8\n  recipebot view --open\n  recipebot ask \"tengo huevos y papas\"\n  recipebot config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a recipebot.toml configuration file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run every conversation in a CSV input source and save a result artifact")]
    Bulk {
        #[arg(long, help = "Input CSV with id, query and human_followup_N columns")]
        csv: Option<PathBuf>,
        #[arg(long, help = "Maximum number of conversations in flight")]
        workers: Option<usize>,
        #[arg(long, help = "Directory receiving results_<timestamp>.csv")]
        results_dir: Option<PathBuf>,
    },
    #[command(about = "Render a result artifact as a paginated HTML viewer")]
    View {
        #[arg(help = "Artifact to render (defaults to the most recent one)")]
        path: Option<PathBuf>,
        #[arg(long, help = "Directory searched for the most recent artifact")]
        results_dir: Option<PathBuf>,
        #[arg(long, help = "Open the viewer in the default browser")]
        open: bool,
    },
    #[command(about = "Send one query (plus optional follow-ups) to the assistant")]
    Ask {
        query: String,
        #[arg(long = "followup", help = "Follow-up message; repeat for several turns")]
        followups: Vec<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, system prompt, credentials, and bulk paths")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let result = execute(cli).await;

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

pub async fn execute(cli: Cli) -> CommandResult {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Config => commands::config::run(config_path),
        Command::Doctor { json } => commands::doctor::run(config_path, json),
        Command::Bulk { csv, workers, results_dir } => match prepare("bulk", config_path) {
            Ok(config) => {
                commands::bulk::run(&config, &BulkArgs { csv, workers, results_dir }).await
            }
            Err(failure) => failure,
        },
        Command::View { path, results_dir, open } => match prepare("view", config_path) {
            Ok(config) => commands::view::run(&config, &ViewArgs { path, results_dir, open }).await,
            Err(failure) => failure,
        },
        Command::Ask { query, followups } => match prepare("ask", config_path) {
            Ok(config) => commands::ask::run(&config, &AskArgs { query, followups }).await,
            Err(failure) => failure,
        },
    }
}

pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load(LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    })
}

fn prepare(command: &str, config_path: Option<&Path>) -> Result<AppConfig, CommandResult> {
    let config =
        load_config(config_path).map_err(|error| CommandResult::config_failure(command, error))?;
    init_logging(&config.logging);
    Ok(config)
}

/// Logs go to stderr; stdout carries progress panels and command output.
pub fn init_logging(config: &LoggingConfig) {
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    // A second initialisation (e.g. from tests) keeps the first subscriber.
    let _ = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
