use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use recipebot_agent::{ChatAgent, ConversationRunner};
use recipebot_core::{validate_records, InputError, InputRecord, RecordId, RunResult};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::progress::{ProgressReporter, RecordEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Runs many independent conversations with at most `concurrency` in flight.
///
/// Every accepted record yields exactly one [`RunResult`], in completion
/// order. A worker that panics or is cancelled is reported as a result carrying a
/// single system error message; it never aborts the batch.
pub struct BulkDispatcher<A> {
    runner: Arc<ConversationRunner<A>>,
    concurrency: usize,
    progress: Arc<dyn ProgressReporter>,
}

impl<A> BulkDispatcher<A>
where
    A: ChatAgent + 'static,
{
    pub fn new(
        runner: Arc<ConversationRunner<A>>,
        concurrency: usize,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self { runner, concurrency, progress }
    }

    pub async fn dispatch(
        &self,
        records: Vec<InputRecord>,
    ) -> Result<Vec<RunResult>, DispatchError> {
        if self.concurrency == 0 {
            return Err(DispatchError::ZeroConcurrency);
        }
        validate_records(&records)?;

        let total = records.len();
        info!(
            event_name = "bulk.dispatch.start",
            total,
            concurrency = self.concurrency,
            "dispatching bulk records"
        );
        self.progress.on_start(total, self.concurrency);

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut workers = JoinSet::new();
        let mut pending: HashMap<Id, (RecordId, String)> = HashMap::with_capacity(total);

        for record in records {
            let runner = Arc::clone(&self.runner);
            let permits = Arc::clone(&permits);
            let key = (record.id.clone(), record.initial_query.clone());

            let handle = workers.spawn(async move {
                let _permit = permits.acquire_owned().await.map_err(|error| error.to_string())?;
                Ok::<_, String>(runner.run_record(&record).await)
            });
            pending.insert(handle.id(), key);
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next_with_id().await {
            let (task_id, outcome) = match joined {
                Ok((task_id, outcome)) => (task_id, outcome),
                Err(join_error) => (join_error.id(), Err(describe_join_error(join_error))),
            };
            // Every joined task was spawned above with its id recorded.
            let Some((id, initial_query)) = pending.remove(&task_id) else {
                continue;
            };

            let (result, failure) = match outcome {
                Ok(result) => (result, None),
                Err(description) => {
                    warn!(
                        event_name = "bulk.worker.failed",
                        record_id = %id,
                        error = %description,
                        "worker failed; recording error result"
                    );
                    (RunResult::worker_failure(id, initial_query, &description), Some(description))
                }
            };

            debug!(
                event_name = "bulk.record.completed",
                record_id = %result.id,
                status = result.status.as_str(),
                messages = result.conversation.len(),
                "record completed"
            );
            self.progress.on_record(&RecordEvent {
                completed: results.len() + 1,
                total,
                result: &result,
                worker_failure: failure.as_deref(),
            });
            results.push(result);
        }

        debug_assert!(pending.is_empty(), "every spawned worker is joined exactly once");

        let failed = results.iter().filter(|result| !result.is_ok()).count();
        info!(event_name = "bulk.dispatch.finished", total, failed, "bulk dispatch finished");
        self.progress.on_finish(total);

        Ok(results)
    }
}

fn describe_join_error(error: JoinError) -> String {
    if error.is_cancelled() {
        return "worker task was cancelled".to_string();
    }
    match error.try_into_panic() {
        Ok(payload) => format!("worker panicked: {}", panic_message(payload.as_ref())),
        Err(error) => error.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
