use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::{AgentConfig, ConfigError};

const BUILTIN_PROMPT: &str = include_str!("../../../prompts/recipe_assistant.md");

/// Process-wide system prompt, loaded once and shared read-only.
#[derive(Clone, PartialEq, Eq)]
pub struct SystemPrompt(Arc<str>);

impl SystemPrompt {
    pub fn builtin() -> Self {
        Self(Arc::from(BUILTIN_PROMPT.trim_end()))
    }

    pub fn new(text: impl AsRef<str>) -> Result<Self, ConfigError> {
        let text = text.as_ref().trim_end();
        if text.trim().is_empty() {
            return Err(ConfigError::Validation("system prompt must not be empty".to_string()));
        }
        Ok(Self(Arc::from(text)))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
        Self::new(raw).map_err(|_| {
            ConfigError::Validation(format!(
                "agent.system_prompt_path `{}` points to an empty file",
                path.display()
            ))
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, ConfigError> {
        match &config.system_prompt_path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Prompts are long; keep debug output readable.
impl fmt::Debug for SystemPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemPrompt").field("chars", &self.0.chars().count()).finish()
    }
}
