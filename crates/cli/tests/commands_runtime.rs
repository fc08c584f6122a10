use std::env;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use recipebot_agent::{AgentError, ChatAgent, LlmError};
use recipebot_bulk::{read_artifact, SilentProgress};
use recipebot_cli::commands::ask::{self, AskArgs};
use recipebot_cli::commands::bulk::{self, BulkArgs};
use recipebot_cli::commands::view::{self, ViewArgs};
use recipebot_cli::commands::{config, doctor};
use recipebot_core::config::AppConfig;
use recipebot_core::{Conversation, Message};
use serde_json::Value;

struct ChefStub;

#[async_trait]
impl ChatAgent for ChefStub {
    async fn respond(
        &self,
        conversation: &Conversation,
        _session_id: Option<&str>,
    ) -> Result<Conversation, AgentError> {
        let last =
            conversation.last().map(|message| message.content.clone()).unwrap_or_default();
        let mut extended = conversation.clone().with_system_prompt("chef");
        extended.push(Message::assistant(format!("## Receta para {last}")));
        Ok(extended)
    }
}

struct DownStub;

#[async_trait]
impl ChatAgent for DownStub {
    async fn respond(
        &self,
        _conversation: &Conversation,
        _session_id: Option<&str>,
    ) -> Result<Conversation, AgentError> {
        Err(AgentError::Llm(LlmError::Timeout(60)))
    }
}

fn write_input(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("queries.csv");
    fs::write(&path, body).expect("write input");
    path
}

fn bulk_args(csv: std::path::PathBuf, results_dir: &Path) -> BulkArgs {
    BulkArgs { csv: Some(csv), workers: Some(2), results_dir: Some(results_dir.to_path_buf()) }
}

#[tokio::test]
async fn bulk_saves_artifact_and_reports_location() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_input(
        dir.path(),
        "id,query,human_followup_1\n1,salmon,\n2,banana bread,make it vegan\n",
    );
    let results_dir = dir.path().join("results");

    let result = bulk::run_with_agent(
        &AppConfig::default(),
        &bulk_args(csv, &results_dir),
        ChefStub,
        Arc::new(SilentProgress),
    )
    .await;

    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
    assert!(result.output.starts_with("Saved 2 results to "));

    let artifact = fs::read_dir(&results_dir)
        .expect("results dir created")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .next()
        .expect("one artifact");
    let rows = read_artifact(&artifact).expect("artifact readable");
    let vegan = rows.iter().find(|row| row.id.0 == "2").expect("row 2");
    assert_eq!(vegan.conversation.len(), 5);
}

#[tokio::test]
async fn bulk_counts_failed_conversations_in_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_input(dir.path(), "id,query\n1,soup\n2,stew\n");

    let result = bulk::run_with_agent(
        &AppConfig::default(),
        &bulk_args(csv, &dir.path().join("results")),
        DownStub,
        Arc::new(SilentProgress),
    )
    .await;

    assert_eq!(result.exit_code, 0);
    assert!(result.output.ends_with("(2 ended in error)"), "got: {}", result.output);
}

#[tokio::test]
async fn bulk_rejects_duplicate_ids_before_dispatch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_input(dir.path(), "id,query\n1,soup\n1,stew\n");
    let results_dir = dir.path().join("results");

    let result = bulk::run_with_agent(
        &AppConfig::default(),
        &bulk_args(csv, &results_dir),
        ChefStub,
        Arc::new(SilentProgress),
    )
    .await;

    assert_eq!(result.exit_code, 4);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "bulk");
    assert_eq!(payload["error_class"], "input_validation");
    assert!(!results_dir.exists(), "no artifact may be written for rejected input");
}

#[tokio::test]
async fn bulk_reports_unreadable_input() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = bulk::run_with_agent(
        &AppConfig::default(),
        &bulk_args(dir.path().join("missing.csv"), dir.path()),
        ChefStub,
        Arc::new(SilentProgress),
    )
    .await;

    assert_eq!(result.exit_code, 4);
    assert_eq!(parse_payload(&result.output)["error_class"], "input_read");
}

#[tokio::test]
async fn bulk_rejects_zero_workers_as_configuration() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_input(dir.path(), "id,query\n1,soup\n");
    let args = BulkArgs { workers: Some(0), ..bulk_args(csv, dir.path()) };

    let result =
        bulk::run_with_agent(&AppConfig::default(), &args, ChefStub, Arc::new(SilentProgress))
            .await;

    assert_eq!(result.exit_code, 2);
    assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
}

#[tokio::test]
async fn view_renders_latest_artifact_of_a_bulk_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let csv = write_input(dir.path(), "id,query\n1,salmon\n2,tacos\n3,flan\n");
    let results_dir = dir.path().join("results");
    let bulk = bulk::run_with_agent(
        &AppConfig::default(),
        &bulk_args(csv, &results_dir),
        ChefStub,
        Arc::new(SilentProgress),
    )
    .await;
    assert_eq!(bulk.exit_code, 0);

    let args = ViewArgs { path: None, results_dir: Some(results_dir.clone()), open: false };
    let result = view::run(&AppConfig::default(), &args).await;

    assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
    assert!(result.output.starts_with("Viewer written to "));
    let html_files = fs::read_dir(&results_dir)
        .expect("results dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("viewer_results_"))
        .count();
    assert_eq!(html_files, 1);
}

#[tokio::test]
async fn view_without_artifacts_fails_with_viewer_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let args = ViewArgs { path: None, results_dir: Some(dir.path().to_path_buf()), open: false };

    let result = view::run(&AppConfig::default(), &args).await;

    assert_eq!(result.exit_code, 6);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "view");
    assert_eq!(payload["error_class"], "artifact_missing");
}

#[tokio::test]
async fn ask_prints_the_reply_only() {
    let args = AskArgs { query: "huevos y papas".to_string(), followups: Vec::new() };
    let result = ask::run_with_agent(&args, ChefStub).await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "## Receta para huevos y papas");
}

#[tokio::test]
async fn ask_with_followups_prints_the_exchange() {
    let args = AskArgs { query: "flan".to_string(), followups: vec!["sin lactosa".to_string()] };
    let result = ask::run_with_agent(&args, ChefStub).await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(
        result.output,
        "User:\nflan\n\nAssistant:\n## Receta para flan\n\n\
         User:\nsin lactosa\n\nAssistant:\n## Receta para sin lactosa"
    );
}

#[tokio::test]
async fn ask_surfaces_agent_failures() {
    let args = AskArgs { query: "flan".to_string(), followups: Vec::new() };
    let result = ask::run_with_agent(&args, DownStub).await;

    assert_eq!(result.exit_code, 3);
    let payload = parse_payload(&result.output);
    assert_eq!(payload["error_class"], "agent_call");
    assert_eq!(payload["message"], "Error processing query: request timed out after 60s");
}

#[test]
fn config_reports_sources_and_redacts_api_key() {
    with_env(
        &[("RECIPEBOT_LLM_MODEL", "gpt-4.1-mini"), ("RECIPEBOT_LLM_API_KEY", "sk-topsecret")],
        || {
            let result = config::run(None);
            assert_eq!(result.exit_code, 0);

            let output = &result.output;
            assert!(output.contains(
                "- llm.model = gpt-4.1-mini (source: env (RECIPEBOT_LLM_MODEL))"
            ));
            assert!(output.contains("- llm.api_key = sk-*** (source: env (RECIPEBOT_LLM_API_KEY))"));
            assert!(output.contains("- bulk.workers = 32 (source: default)"));
            assert!(!output.contains("topsecret"));
        },
    );
}

#[test]
fn config_reports_file_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("recipebot.toml");
    fs::write(&path, "[bulk]\nworkers = 4\n").expect("write config");

    with_env(&[], || {
        let result = config::run(Some(&path));
        assert_eq!(result.exit_code, 0);
        assert!(result
            .output
            .contains(&format!("- bulk.workers = 4 (source: file ({}))", path.display())));
    });
}

#[test]
fn config_returns_failure_for_invalid_env() {
    with_env(&[("RECIPEBOT_BULK_WORKERS", "0")], || {
        let result = config::run(None);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_fails_without_credentials() {
    with_env(&[], || {
        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        let credentials = payload["checks"]
            .as_array()
            .and_then(|checks| checks.iter().find(|check| check["name"] == "llm_credentials"))
            .expect("credentials check");
        assert_eq!(credentials["status"], "fail");
    });
}

#[test]
fn doctor_passes_with_api_key() {
    with_env(&[("RECIPEBOT_LLM_API_KEY", "sk-test")], || {
        let result = doctor::run(None, false);
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] system_prompt: built-in prompt loaded"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "RECIPEBOT_LLM_PROVIDER",
        "RECIPEBOT_LLM_API_KEY",
        "RECIPEBOT_LLM_BASE_URL",
        "RECIPEBOT_LLM_MODEL",
        "RECIPEBOT_LLM_TIMEOUT_SECS",
        "RECIPEBOT_LLM_TEMPERATURE",
        "RECIPEBOT_AGENT_SYSTEM_PROMPT_PATH",
        "RECIPEBOT_BULK_WORKERS",
        "RECIPEBOT_BULK_INPUT_PATH",
        "RECIPEBOT_BULK_RESULTS_DIR",
        "RECIPEBOT_TELEMETRY_ENABLED",
        "RECIPEBOT_TELEMETRY_PROJECT_NAME",
        "RECIPEBOT_SERVER_BIND_ADDRESS",
        "RECIPEBOT_SERVER_PORT",
        "RECIPEBOT_LOGGING_LEVEL",
        "RECIPEBOT_LOGGING_FORMAT",
        "RECIPEBOT_LOG_LEVEL",
        "RECIPEBOT_LOG_FORMAT",
        "MODEL_NAME",
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
