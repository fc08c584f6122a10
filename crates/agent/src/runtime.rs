use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use recipebot_core::config::{AppConfig, ConfigError};
use recipebot_core::{Conversation, Message, SystemPrompt};
use thiserror::Error;
use tracing::{info_span, warn, Instrument};

use crate::llm::{client_from_config, CompletionRequest, LlmClient, LlmError};
use crate::telemetry::{
    notify_end, notify_start, CallObserver, CallSpan, CallStart, SpanStatus, TracingObserver,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Error)]
pub enum RuntimeBuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// A single turn against the model.
///
/// Implementations return the input conversation, with the system prompt as
/// its first message, extended by exactly one assistant message.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn respond(
        &self,
        conversation: &Conversation,
        session_id: Option<&str>,
    ) -> Result<Conversation, AgentError>;
}

#[async_trait]
impl<T> ChatAgent for Arc<T>
where
    T: ChatAgent + ?Sized,
{
    async fn respond(
        &self,
        conversation: &Conversation,
        session_id: Option<&str>,
    ) -> Result<Conversation, AgentError> {
        (**self).respond(conversation, session_id).await
    }
}

pub struct AgentRuntime {
    client: Arc<dyn LlmClient>,
    model: String,
    temperature: Option<f32>,
    system_prompt: SystemPrompt,
    observer: Option<Arc<dyn CallObserver>>,
}

impl AgentRuntime {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        system_prompt: SystemPrompt,
    ) -> Self {
        Self { client, model: model.into(), temperature: None, system_prompt, observer: None }
    }

    /// Wires the HTTP client, system prompt, and telemetry from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, RuntimeBuildError> {
        let system_prompt = SystemPrompt::from_config(&config.agent)?;
        let client = client_from_config(&config.llm)?;
        let mut runtime = Self::new(client, config.llm.model.clone(), system_prompt);
        runtime.temperature = config.llm.temperature;
        if config.telemetry.enabled {
            let observer = TracingObserver::new(config.telemetry.project_name.clone());
            runtime = runtime.with_observer(Arc::new(observer));
        }
        Ok(runtime)
    }

    pub fn with_observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_prompt(&self) -> &SystemPrompt {
        &self.system_prompt
    }
}

#[async_trait]
impl ChatAgent for AgentRuntime {
    async fn respond(
        &self,
        conversation: &Conversation,
        session_id: Option<&str>,
    ) -> Result<Conversation, AgentError> {
        let prepared = conversation.clone().with_system_prompt(self.system_prompt.as_str());
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: prepared.messages().to_vec(),
            temperature: self.temperature,
        };

        let observer = self.observer.as_deref();
        let input_messages =
            if observer.is_some() { encode_messages(prepared.messages()) } else { String::new() };
        notify_start(
            observer,
            &CallStart {
                model: self.model.clone(),
                provider: self.client.provider().to_string(),
                session_id: session_id.map(str::to_string),
                input_messages: input_messages.clone(),
            },
        );

        let span = info_span!(
            "llm.completion",
            llm.model_name = %self.model,
            llm.provider = self.client.provider(),
            session.id = session_id.unwrap_or("none"),
            messages = request.messages.len(),
        );
        let started = Instant::now();
        let outcome = self
            .client
            .complete(&request)
            .instrument(span)
            .await
            .map(|reply| reply.trim().to_string())
            .map_err(AgentError::from);
        let duration_ms = started.elapsed().as_millis() as u64;

        let mut span = CallSpan {
            model: self.model.clone(),
            provider: self.client.provider().to_string(),
            session_id: session_id.map(str::to_string),
            input_messages,
            output_messages: None,
            status: SpanStatus::Ok,
            duration_ms,
        };

        match outcome {
            Ok(reply) => {
                let reply = Message::assistant(reply);
                if observer.is_some() {
                    span.output_messages = Some(encode_messages(std::slice::from_ref(&reply)));
                }
                notify_end(observer, &span);

                let mut extended = prepared;
                extended.push(reply);
                Ok(extended)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.call.failed",
                    session_id = session_id.unwrap_or("none"),
                    model = %self.model,
                    error = %error,
                    "agent call failed"
                );
                span.status = SpanStatus::Error(error.to_string());
                notify_end(observer, &span);
                Err(error)
            }
        }
    }
}

fn encode_messages(messages: &[Message]) -> String {
    serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_string())
}
