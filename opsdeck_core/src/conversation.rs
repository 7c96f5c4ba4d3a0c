//! Chat transcript state for one console session.
//!
//! Messages are append-only. The only in-place mutations allowed are the
//! execution-state transitions: a message created in `Executing` state is
//! later finalized (back to `None`) or rewritten to `Cancelled`. Nothing
//! may remain stuck in `Executing`.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::locale::Locale;
use crate::resolver::IntentResolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    #[default]
    None,
    Executing,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Single action reference when the resolver found a direct match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_action_id: Option<String>,
    /// Ordered action references; insertion order is the resolver's
    /// relevance order.
    #[serde(default)]
    pub suggested_action_ids: Vec<String>,
    #[serde(default)]
    pub execution_state: ExecutionState,
    #[serde(default)]
    pub is_error: bool,
}

impl ChatMessage {
    fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
            matched_action_id: None,
            suggested_action_ids: Vec::new(),
            execution_state: ExecutionState::None,
            is_error: false,
        }
    }
}

/// Owned transcript for a single session. No ambient singletons: whoever
/// bootstraps the session owns the handle and passes it to the pipeline.
pub struct Conversation {
    messages: RwLock<Vec<ChatMessage>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
        }
    }

    pub fn push_user(&self, text: impl Into<String>) -> String {
        self.push(ChatMessage::new(ChatRole::User, text))
    }

    pub fn push_assistant(&self, text: impl Into<String>) -> String {
        self.push(ChatMessage::new(ChatRole::Assistant, text))
    }

    /// Fold a resolver outcome into an assistant message carrying the match
    /// or suggestion references.
    pub fn push_resolution(&self, resolution: &IntentResolution) -> String {
        let mut message = ChatMessage::new(ChatRole::Assistant, resolution.reply.clone());
        message.matched_action_id = resolution.matched_action_id.clone();
        message.suggested_action_ids = resolution.suggested_action_ids.clone();
        self.push(message)
    }

    /// Inline error bubble. The conversation stays usable afterwards.
    pub fn push_error(&self, text: impl Into<String>) -> String {
        let mut message = ChatMessage::new(ChatRole::Assistant, text);
        message.is_error = true;
        self.push(message)
    }

    /// Append the "{executing-label}: {name}..." message for an entry that
    /// just started and return its id for the later transition.
    pub fn begin_execution(&self, action_name: &str, locale: Locale) -> String {
        let mut message = ChatMessage::new(
            ChatRole::Assistant,
            format!("{}: {}...", locale.executing_label(), action_name),
        );
        message.execution_state = ExecutionState::Executing;
        self.push(message)
    }

    /// Finalize an executing message after a normal completion.
    pub fn complete_execution(&self, message_id: &str, action_name: &str, locale: Locale) {
        self.transition(message_id, |message| {
            message.execution_state = ExecutionState::None;
            message.text = format!("{}: {}", locale.executed_label(), action_name);
        });
    }

    /// Rewrite an executing message in place to its cancelled form.
    pub fn cancel_execution(&self, message_id: &str, action_name: &str, locale: Locale) {
        self.transition(message_id, |message| {
            message.execution_state = ExecutionState::Cancelled;
            message.text = format!("{}: {}", locale.cancelled_label(), action_name);
        });
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.read().expect("conversation lock").clone()
    }

    pub fn len(&self) -> usize {
        self.messages.read().expect("conversation lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, message: ChatMessage) -> String {
        let id = message.id.clone();
        self.messages.write().expect("conversation lock").push(message);
        id
    }

    fn transition(&self, message_id: &str, apply: impl FnOnce(&mut ChatMessage)) {
        let mut messages = self.messages.write().expect("conversation lock");
        match messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => apply(message),
            None => tracing::warn!("execution transition for unknown message {}", message_id),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
