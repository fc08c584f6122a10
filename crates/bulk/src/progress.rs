use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use recipebot_core::RunResult;

/// One finished record, as seen by a progress reporter.
#[derive(Clone, Copy, Debug)]
pub struct RecordEvent<'a> {
    /// 1-based position in completion order.
    pub completed: usize,
    pub total: usize,
    pub result: &'a RunResult,
    /// Set when the worker died and `result` was synthesized for it.
    pub worker_failure: Option<&'a str>,
}

/// Receives dispatch progress. Called from the single collecting loop, so
/// implementations never see two events at once.
pub trait ProgressReporter: Send + Sync {
    fn on_start(&self, _total: usize, _concurrency: usize) {}

    fn on_record(&self, event: &RecordEvent<'_>);

    fn on_finish(&self, _total: usize) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn on_record(&self, _event: &RecordEvent<'_>) {}
}

/// Prints a titled panel per finished conversation.
pub struct ConsoleProgress<W> {
    out: Mutex<W>,
}

impl ConsoleProgress<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W> ConsoleProgress<W>
where
    W: Write + Send,
{
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // Console output is best effort; a closed pipe must not fail the run.
        let _ = out.write_all(text.as_bytes()).and_then(|()| out.flush());
    }
}

impl<W> ProgressReporter for ConsoleProgress<W>
where
    W: Write + Send,
{
    fn on_start(&self, total: usize, concurrency: usize) {
        self.write(&format!(
            "Submitting {total} queries to {} workers...\n",
            concurrency.min(total).max(1)
        ));
    }

    fn on_record(&self, event: &RecordEvent<'_>) {
        self.write(&render_panel(event));
    }

    fn on_finish(&self, total: usize) {
        self.write(&format!("All {total} queries processed.\n"));
    }
}

/// Collects events for assertions.
#[derive(Clone, Debug, Default)]
pub struct RecordingProgress {
    events: Arc<Mutex<Vec<(usize, usize, String, bool)>>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(completed, total, record id, worker failure)` per event.
    pub fn events(&self) -> Vec<(usize, usize, String, bool)> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ProgressReporter for RecordingProgress {
    fn on_record(&self, event: &RecordEvent<'_>) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push((
            event.completed,
            event.total,
            event.result.id.0.clone(),
            event.worker_failure.is_some(),
        ));
    }
}

pub fn render_panel(event: &RecordEvent<'_>) -> String {
    let result = event.result;
    let mut panel = String::new();

    if let Some(description) = event.worker_failure {
        panel.push_str(&rule(&format!(
            "Error in Result {}/{} - ID: {}",
            event.completed, event.total, result.id
        )));
        panel.push_str(&format!(
            "Exception for ID {}, Query:\n{}\n",
            result.id, result.initial_query
        ));
        panel.push_str(&format!("Error:\n{description}\n\n"));
        return panel;
    }

    panel.push_str(&rule(&format!(
        "Result {}/{} - ID: {}",
        event.completed, event.total, result.id
    )));
    // The leading system prompt is the same for every record; skip it.
    let messages = result.conversation.messages();
    let skip = usize::from(result.conversation.starts_with_system() && messages.len() > 1);
    for message in &messages[skip..] {
        panel.push_str(&format!("{}:\n{}\n\n", message.role.label(), message.content));
    }
    panel
}

fn rule(title: &str) -> String {
    format!("──── {title} {}\n", "─".repeat(60usize.saturating_sub(title.chars().count())))
}
