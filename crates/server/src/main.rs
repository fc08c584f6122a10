mod app;
mod chat;
mod health;

use std::sync::Arc;

use anyhow::{Context, Result};
use recipebot_agent::AgentRuntime;
use recipebot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use recipebot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let runtime = AgentRuntime::from_config(&config).context("building agent runtime")?;
    let model = runtime.model().to_string();
    let app = app::router(Arc::new(runtime), model.clone());

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;

    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        model = %model,
        "recipebot-server listening"
    );
    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown()).await?;
    tracing::info!(event_name = "system.server.stopping", "recipebot-server stopping");

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(
            event_name = "system.server.signal_error",
            error = %error,
            "failed to listen for ctrl-c; shutting down"
        );
    }
}
