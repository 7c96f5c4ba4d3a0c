//! Session wiring: owns every core component for one console session and
//! serves UI commands on a dedicated thread with its own tokio runtime.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};

use crate::audit::AuditLog;
use crate::config::ConsoleConfig;
use crate::conversation::Conversation;
use crate::events::ConsoleEvent;
use crate::locale::Locale;
use crate::queue::ExecutionQueue;
use crate::registry::ActionRegistry;
use crate::resolver::IntentResolver;
use crate::synthesizer::{MockSynthesizer, ResponseSynthesizer};

#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    /// Free-text user input for the chat transcript.
    SendMessage(String),
    /// Queue an execution attempt for the given action id.
    ExecuteAction(String),
    /// Cancel the in-flight execution, if any.
    CancelExecution,
    Shutdown,
}

pub struct ConsoleRuntime {
    pub config: ConsoleConfig,
    pub registry: Arc<ActionRegistry>,
    pub conversation: Arc<Conversation>,
    pub audit: Arc<AuditLog>,
    queue: Arc<ExecutionQueue>,
    resolver: Arc<IntentResolver>,
    event_tx: Sender<ConsoleEvent>,
}

impl ConsoleRuntime {
    pub fn bootstrap(config: ConsoleConfig, event_tx: Sender<ConsoleEvent>) -> Self {
        let registry = Arc::new(ActionRegistry::with_samples());
        let conversation = Arc::new(Conversation::new());
        let audit = Arc::new(AuditLog::new());
        let resolver = Arc::new(IntentResolver::from_config(&config));
        let synthesizer: Arc<dyn ResponseSynthesizer> = Arc::new(MockSynthesizer::new());

        let queue = ExecutionQueue::new(
            registry.clone(),
            conversation.clone(),
            audit.clone(),
            synthesizer,
            event_tx.clone(),
            Duration::from_millis(config.simulated_latency_ms),
            config.locale,
        );

        tracing::info!(
            "console session ready ({} actions, locale {})",
            registry.len(),
            config.locale.tag()
        );

        Self {
            config,
            registry,
            conversation,
            audit,
            queue,
            resolver,
            event_tx,
        }
    }

    pub fn queue(&self) -> &Arc<ExecutionQueue> {
        &self.queue
    }

    /// Spawn the session loop on its own thread. The loop owns the queue
    /// worker and serves commands until `Shutdown` or channel disconnect.
    pub fn spawn_session_loop(&self, command_rx: Receiver<ConsoleCommand>) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let conversation = self.conversation.clone();
        let resolver = self.resolver.clone();
        let queue = self.queue.clone();
        let event_tx = self.event_tx.clone();
        let locale = self.config.locale;

        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().expect("console session runtime");
            rt.block_on(async move {
                let _worker = queue.spawn_worker();

                while let Ok(command) = command_rx.recv_async().await {
                    match command {
                        ConsoleCommand::SendMessage(text) => {
                            handle_user_message(
                                &text,
                                &registry,
                                &conversation,
                                &resolver,
                                &event_tx,
                                locale,
                            )
                            .await;
                        }
                        ConsoleCommand::ExecuteAction(action_id) => {
                            queue.enqueue(action_id);
                        }
                        ConsoleCommand::CancelExecution => {
                            if !queue.cancel_current() {
                                tracing::debug!("cancel requested with nothing in flight");
                            }
                        }
                        ConsoleCommand::Shutdown => break,
                    }
                }
                tracing::info!("console session loop stopped");
            });
        })
    }
}

async fn handle_user_message(
    text: &str,
    registry: &ActionRegistry,
    conversation: &Conversation,
    resolver: &IntentResolver,
    event_tx: &Sender<ConsoleEvent>,
    locale: Locale,
) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }

    conversation.push_user(trimmed);
    let _ = event_tx.send(ConsoleEvent::ConversationChanged);

    let actions = registry.list();
    let resolution = resolver.resolve(trimmed, &actions, locale).await;
    tracing::debug!(
        "resolved input (match: {:?}, suggestions: {}, confidence: {:.2})",
        resolution.matched_action_id,
        resolution.suggested_action_ids.len(),
        resolution.confidence
    );

    conversation.push_resolution(&resolution);
    let _ = event_tx.send(ConsoleEvent::ConversationChanged);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ChatRole;

    fn test_runtime() -> (ConsoleRuntime, Receiver<ConsoleEvent>) {
        let (event_tx, event_rx) = flume::unbounded();
        let mut config = ConsoleConfig::default();
        config.simulated_latency_ms = 20;
        (ConsoleRuntime::bootstrap(config, event_tx), event_rx)
    }

    #[test]
    fn send_message_resolves_offline_and_replies() {
        let (runtime, _event_rx) = test_runtime();
        let (command_tx, command_rx) = flume::unbounded();
        let handle = runtime.spawn_session_loop(command_rx);

        command_tx
            .send(ConsoleCommand::SendMessage("list all commands".to_string()))
            .unwrap();

        for _ in 0..200 {
            if runtime.conversation.len() >= 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let messages = runtime.conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
        assert_eq!(messages[1].role, ChatRole::Assistant);
        // No credential configured: the offline catalog branch answers
        let executable = runtime.registry.executable();
        assert_eq!(messages[1].suggested_action_ids.len(), executable.len());

        command_tx.send(ConsoleCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn execute_command_runs_through_the_queue() {
        let (runtime, _event_rx) = test_runtime();
        let (command_tx, command_rx) = flume::unbounded();
        let handle = runtime.spawn_session_loop(command_rx);

        let action = runtime
            .registry
            .executable()
            .into_iter()
            .next()
            .expect("sample catalog has executable actions");
        command_tx
            .send(ConsoleCommand::ExecuteAction(action.id.clone()))
            .unwrap();

        for _ in 0..200 {
            if !runtime.audit.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let records = runtime.audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action_id, action.id);

        command_tx.send(ConsoleCommand::Shutdown).unwrap();
        handle.join().unwrap();
    }
}
