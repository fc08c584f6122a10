pub mod config;
pub mod domain;
pub mod errors;
pub mod prompt;

pub use domain::conversation::{Conversation, Message, Role};
pub use domain::record::{validate_records, InputRecord, RecordId};
pub use domain::result::{RunResult, RunStatus};
pub use errors::InputError;
pub use prompt::SystemPrompt;
