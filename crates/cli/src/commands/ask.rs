use recipebot_agent::{AgentRuntime, ChatAgent, ConversationRunner};
use recipebot_core::config::AppConfig;
use recipebot_core::{Role, RunStatus};

use crate::commands::{CommandResult, EXIT_INPUT, EXIT_RUNTIME};

const COMMAND: &str = "ask";

#[derive(Clone, Debug, Default)]
pub struct AskArgs {
    pub query: String,
    pub followups: Vec<String>,
}

pub async fn run(config: &AppConfig, args: &AskArgs) -> CommandResult {
    match AgentRuntime::from_config(config) {
        Ok(runtime) => run_with_agent(args, runtime).await,
        Err(error) => {
            CommandResult::failure(COMMAND, "runtime_init", error.to_string(), EXIT_RUNTIME)
        }
    }
}

/// A single query prints just the reply; with follow-ups the whole exchange
/// is printed with role labels.
pub async fn run_with_agent<A: ChatAgent>(args: &AskArgs, agent: A) -> CommandResult {
    if args.query.trim().is_empty() {
        return CommandResult::failure(COMMAND, "input_validation", "query is empty", EXIT_INPUT);
    }

    let outcome = ConversationRunner::new(agent).run(&args.query, &args.followups, None).await;
    let conversation = outcome.conversation;

    if outcome.status == RunStatus::Error {
        let description = conversation.last().map(|message| message.content.clone());
        return CommandResult::failure(
            COMMAND,
            "agent_call",
            description.unwrap_or_else(|| "agent call failed".to_string()),
            EXIT_RUNTIME,
        );
    }

    if args.followups.is_empty() {
        let reply = conversation.last().map(|message| message.content.as_str());
        return CommandResult::text(reply.unwrap_or_default());
    }

    let exchange = conversation
        .iter()
        .filter(|message| message.role != Role::System)
        .map(|message| format!("{}:\n{}", message.role.label(), message.content))
        .collect::<Vec<_>>();
    CommandResult::text(exchange.join("\n\n"))
}
