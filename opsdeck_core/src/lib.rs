//! Core of the OpsDeck operations console.
//!
//! Everything that is not pixels lives here: the action catalog, the
//! natural-language intent resolver with its deterministic offline
//! fallback, the single-flight execution queue with cooperative
//! cancellation, the mocked execution backend, the audit trail, and the
//! session runtime that wires them together for the desktop shell.

pub mod audit;
pub mod config;
pub mod conversation;
pub mod events;
pub mod llm_client;
pub mod locale;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod synthesizer;

pub use audit::{AuditLog, ExecutionRecord, ExecutionStatus, CANCELLED_RETURN_CODE};
pub use config::ConsoleConfig;
pub use conversation::{ChatMessage, ChatRole, Conversation, ExecutionState};
pub use events::ConsoleEvent;
pub use locale::Locale;
pub use queue::ExecutionQueue;
pub use registry::{Action, ActionKind, ActionRegistry};
pub use resolver::{IntentResolution, IntentResolver};
pub use runtime::{ConsoleCommand, ConsoleRuntime};
pub use synthesizer::{MockSynthesizer, ResponseSynthesizer, SynthesizedResponse};
