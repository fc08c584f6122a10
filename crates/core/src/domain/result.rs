use serde::{Deserialize, Serialize};

use crate::domain::conversation::{Conversation, Message};
use crate::domain::record::{InputRecord, RecordId};

pub const TURN_FAILURE_PREFIX: &str = "Error processing query: ";
pub const WORKER_FAILURE_PREFIX: &str = "Exception during processing: ";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Ok,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// Marker appended when a turn fails; the conversation so far is kept.
pub fn turn_failure_message(description: &str) -> Message {
    Message::system(format!("{TURN_FAILURE_PREFIX}{description}"))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub id: RecordId,
    pub initial_query: String,
    pub conversation: Conversation,
    pub status: RunStatus,
}

impl RunResult {
    pub fn new(record: &InputRecord, conversation: Conversation, status: RunStatus) -> Self {
        Self {
            id: record.id.clone(),
            initial_query: record.initial_query.clone(),
            conversation,
            status,
        }
    }

    /// Result for a record whose worker died before reporting anything.
    pub fn worker_failure(id: RecordId, initial_query: String, description: &str) -> Self {
        Self {
            id,
            initial_query,
            conversation: Conversation::from_messages(vec![Message::system(format!(
                "{WORKER_FAILURE_PREFIX}{description}"
            ))]),
            status: RunStatus::Error,
        }
    }

    /// Rebuilds a result read back from an artifact, which stores no status
    /// column; the status is recovered from the trailing error marker.
    pub fn from_persisted(id: RecordId, initial_query: String, conversation: Conversation) -> Self {
        let status =
            if conversation.ends_in_error() { RunStatus::Error } else { RunStatus::Ok };
        Self { id, initial_query, conversation, status }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}
