use recipebot_core::domain::result::turn_failure_message;
use recipebot_core::{Conversation, InputRecord, Message, RunResult, RunStatus};
use tracing::{debug, warn};

use crate::runtime::ChatAgent;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationOutcome {
    pub conversation: Conversation,
    pub status: RunStatus,
}

/// Drives one scripted conversation: the opening query, then each follow-up
/// in order, every turn sending the whole accumulated history.
///
/// The first failed turn ends the conversation. The history up to that
/// point is kept and closed with a system error marker; nothing is retried.
#[derive(Clone, Debug)]
pub struct ConversationRunner<A> {
    agent: A,
}

impl<A> ConversationRunner<A>
where
    A: ChatAgent,
{
    pub fn new(agent: A) -> Self {
        Self { agent }
    }

    pub async fn run(
        &self,
        initial_query: &str,
        followups: &[String],
        session_id: Option<&str>,
    ) -> ConversationOutcome {
        let mut conversation = Conversation::opening(initial_query);
        let turns = std::iter::once(None).chain(followups.iter().map(Some));

        for (turn, followup) in turns.enumerate() {
            if let Some(followup) = followup {
                conversation.push(Message::user(followup.as_str()));
            }

            match self.agent.respond(&conversation, session_id).await {
                Ok(extended) => {
                    debug!(
                        event_name = "agent.turn.completed",
                        session_id = session_id.unwrap_or("none"),
                        turn,
                        messages = extended.len(),
                        "turn completed"
                    );
                    conversation = extended;
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.turn.failed",
                        session_id = session_id.unwrap_or("none"),
                        turn,
                        error = %error,
                        "turn failed; ending conversation"
                    );
                    conversation.push(turn_failure_message(&error.to_string()));
                    return ConversationOutcome { conversation, status: RunStatus::Error };
                }
            }
        }

        ConversationOutcome { conversation, status: RunStatus::Ok }
    }

    /// Runs a bulk record, correlating telemetry by the record id.
    pub async fn run_record(&self, record: &InputRecord) -> RunResult {
        let outcome =
            self.run(&record.initial_query, &record.followups, Some(record.id.0.as_str())).await;
        RunResult::new(record, outcome.conversation, outcome.status)
    }
}
