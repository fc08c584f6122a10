pub mod conversation;
pub mod record;
pub mod result;
