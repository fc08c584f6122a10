use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use recipebot_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_FILE, NESTED_CONFIG_FILE};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::CommandResult;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

impl Field {
    fn new(
        key: &'static str,
        value: impl Into<String>,
        env_keys: &'static [&'static str],
    ) -> Self {
        Self { key, value: value.into(), env_keys }
    }
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let options = LoadOptions {
        config_path: config_path.map(Path::to_path_buf),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("config", error),
    };

    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::text(lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config
        .llm
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    let optional_path = |path: Option<&PathBuf>| {
        path.map(|path| path.display().to_string()).unwrap_or_else(|| "<builtin>".to_string())
    };

    vec![
        Field::new("llm.provider", config.llm.provider.as_str(), &["RECIPEBOT_LLM_PROVIDER"]),
        Field::new(
            "llm.model",
            config.llm.model.as_str(),
            &["RECIPEBOT_LLM_MODEL", "MODEL_NAME"],
        ),
        Field::new(
            "llm.api_key",
            api_key,
            &["RECIPEBOT_LLM_API_KEY", "OPENAI_API_KEY", "ANTHROPIC_API_KEY"],
        ),
        Field::new("llm.base_url", config.llm.base_url(), &["RECIPEBOT_LLM_BASE_URL"]),
        Field::new(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["RECIPEBOT_LLM_TIMEOUT_SECS"],
        ),
        Field::new(
            "llm.temperature",
            config
                .llm
                .temperature
                .map_or_else(|| "<provider default>".to_string(), |value| value.to_string()),
            &["RECIPEBOT_LLM_TEMPERATURE"],
        ),
        Field::new(
            "agent.system_prompt_path",
            optional_path(config.agent.system_prompt_path.as_ref()),
            &["RECIPEBOT_AGENT_SYSTEM_PROMPT_PATH"],
        ),
        Field::new("bulk.workers", config.bulk.workers.to_string(), &["RECIPEBOT_BULK_WORKERS"]),
        Field::new(
            "bulk.input_path",
            config.bulk.input_path.display().to_string(),
            &["RECIPEBOT_BULK_INPUT_PATH"],
        ),
        Field::new(
            "bulk.results_dir",
            config.bulk.results_dir.display().to_string(),
            &["RECIPEBOT_BULK_RESULTS_DIR"],
        ),
        Field::new(
            "telemetry.enabled",
            config.telemetry.enabled.to_string(),
            &["RECIPEBOT_TELEMETRY_ENABLED"],
        ),
        Field::new(
            "telemetry.project_name",
            config.telemetry.project_name.as_str(),
            &["RECIPEBOT_TELEMETRY_PROJECT_NAME"],
        ),
        Field::new(
            "server.bind_address",
            config.server.bind_address.as_str(),
            &["RECIPEBOT_SERVER_BIND_ADDRESS"],
        ),
        Field::new("server.port", config.server.port.to_string(), &["RECIPEBOT_SERVER_PORT"]),
        Field::new(
            "logging.level",
            config.logging.level.as_str(),
            &["RECIPEBOT_LOGGING_LEVEL", "RECIPEBOT_LOG_LEVEL"],
        ),
        Field::new(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["RECIPEBOT_LOGGING_FORMAT", "RECIPEBOT_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let root = PathBuf::from(DEFAULT_CONFIG_FILE);
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from(NESTED_CONFIG_FILE);
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
