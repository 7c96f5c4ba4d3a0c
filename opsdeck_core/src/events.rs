//! Events pushed from the session core to the UI shell.

use crate::audit::ExecutionStatus;

#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    /// The transcript changed; re-read the conversation snapshot.
    ConversationChanged,
    ExecutionQueued { action_id: String },
    ExecutionStarted { action_id: String },
    ExecutionFinished {
        action_id: String,
        status: ExecutionStatus,
    },
    Error(String),
}
