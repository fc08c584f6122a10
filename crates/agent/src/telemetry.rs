//! Observability hooks around a single model call.
//!
//! The runtime reports a [`CallStart`] before each completion request and a
//! [`CallSpan`] after it. Observers are purely observational: a panicking
//! observer is contained and never changes the outcome of the call.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error(_) => "ERROR",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallStart {
    pub model: String,
    pub provider: String,
    pub session_id: Option<String>,
    /// JSON array of the messages sent to the model.
    pub input_messages: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallSpan {
    pub model: String,
    pub provider: String,
    pub session_id: Option<String>,
    pub input_messages: String,
    /// JSON array holding the assistant reply; absent when the call failed.
    pub output_messages: Option<String>,
    pub status: SpanStatus,
    pub duration_ms: u64,
}

pub trait CallObserver: Send + Sync {
    fn on_call_start(&self, _start: &CallStart) {}

    fn on_call_end(&self, span: &CallSpan);
}

pub(crate) fn notify_start(observer: Option<&dyn CallObserver>, start: &CallStart) {
    let Some(observer) = observer else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| observer.on_call_start(start))).is_err() {
        warn!(
            event_name = "agent.telemetry.observer_panicked",
            hook = "start",
            "call observer panicked"
        );
    }
}

pub(crate) fn notify_end(observer: Option<&dyn CallObserver>, span: &CallSpan) {
    let Some(observer) = observer else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(|| observer.on_call_end(span))).is_err() {
        warn!(
            event_name = "agent.telemetry.observer_panicked",
            hook = "end",
            "call observer panicked"
        );
    }
}

/// Emits one structured `tracing` event per completed call.
#[derive(Clone, Debug)]
pub struct TracingObserver {
    project_name: String,
}

impl TracingObserver {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self { project_name: project_name.into() }
    }
}

impl CallObserver for TracingObserver {
    fn on_call_end(&self, span: &CallSpan) {
        let session_id = span.session_id.as_deref().unwrap_or("none");
        match &span.status {
            SpanStatus::Ok => info!(
                event_name = "agent.call.span",
                project = %self.project_name,
                llm.provider = %span.provider,
                llm.model_name = %span.model,
                session.id = session_id,
                input.value = %span.input_messages,
                output.value = span.output_messages.as_deref().unwrap_or("[]"),
                duration_ms = span.duration_ms,
                status = span.status.as_str(),
                "llm call completed"
            ),
            SpanStatus::Error(description) => warn!(
                event_name = "agent.call.span",
                project = %self.project_name,
                llm.provider = %span.provider,
                llm.model_name = %span.model,
                session.id = session_id,
                input.value = %span.input_messages,
                duration_ms = span.duration_ms,
                status = span.status.as_str(),
                error = %description,
                "llm call failed"
            ),
        }
    }
}

/// Collects spans in memory; handy for tests and local inspection.
#[derive(Clone, Debug, Default)]
pub struct InMemoryObserver {
    starts: Arc<Mutex<Vec<CallStart>>>,
    spans: Arc<Mutex<Vec<CallSpan>>>,
}

impl InMemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starts(&self) -> Vec<CallStart> {
        self.starts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn spans(&self) -> Vec<CallSpan> {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CallObserver for InMemoryObserver {
    fn on_call_start(&self, start: &CallStart) {
        self.starts.lock().unwrap_or_else(PoisonError::into_inner).push(start.clone());
    }

    fn on_call_end(&self, span: &CallSpan) {
        self.spans.lock().unwrap_or_else(PoisonError::into_inner).push(span.clone());
    }
}
