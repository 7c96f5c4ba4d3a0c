//! Serial execution pipeline.
//!
//! Entries enter through an unbounded channel and are drained by exactly
//! one worker task, which is what enforces the two ordering guarantees the
//! rest of the console relies on: at most one entry executes at any
//! instant, and entries execute in strict FIFO order relative to enqueue.
//! The `executing` flag and pending counter exist for UI state only; they
//! are not what provides mutual exclusion.
//!
//! Each dequeued entry produces exactly one audit record, whether it
//! completed, was cancelled mid-wait, or referenced an action that no
//! longer exists.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditLog, ExecutionRecord, ExecutionStatus, CANCELLED_RETURN_CODE};
use crate::conversation::Conversation;
use crate::events::ConsoleEvent;
use crate::locale::Locale;
use crate::registry::{Action, ActionKind, ActionRegistry};
use crate::synthesizer::ResponseSynthesizer;

struct QueueEntry {
    action_id: String,
}

pub struct ExecutionQueue {
    registry: Arc<ActionRegistry>,
    conversation: Arc<Conversation>,
    audit: Arc<AuditLog>,
    synthesizer: Arc<dyn ResponseSynthesizer>,
    event_tx: flume::Sender<ConsoleEvent>,
    entry_tx: flume::Sender<QueueEntry>,
    entry_rx: flume::Receiver<QueueEntry>,
    /// Token for the entry currently in its cancellable wait, if any.
    /// Exactly one token is live at a time.
    current_cancel: Mutex<Option<CancellationToken>>,
    executing: AtomicBool,
    outstanding: AtomicUsize,
    simulated_latency: Duration,
    locale: Locale,
}

impl ExecutionQueue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ActionRegistry>,
        conversation: Arc<Conversation>,
        audit: Arc<AuditLog>,
        synthesizer: Arc<dyn ResponseSynthesizer>,
        event_tx: flume::Sender<ConsoleEvent>,
        simulated_latency: Duration,
        locale: Locale,
    ) -> Arc<Self> {
        let (entry_tx, entry_rx) = flume::unbounded();
        Arc::new(Self {
            registry,
            conversation,
            audit,
            synthesizer,
            event_tx,
            entry_tx,
            entry_rx,
            current_cancel: Mutex::new(None),
            executing: AtomicBool::new(false),
            outstanding: AtomicUsize::new(0),
            simulated_latency,
            locale,
        })
    }

    /// Spawn the single worker draining the entry channel. Must be called
    /// exactly once, from within a tokio runtime.
    pub fn spawn_worker(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(entry) = queue.entry_rx.recv_async().await {
                queue.executing.store(true, Ordering::SeqCst);
                queue.run_entry(entry).await;
                queue.executing.store(false, Ordering::SeqCst);
                queue.outstanding.fetch_sub(1, Ordering::SeqCst);
            }
            tracing::debug!("execution queue worker stopped");
        })
    }

    /// Append an execution attempt to the tail of the queue. Safe to call
    /// at any time; duplicate action ids are independent attempts.
    pub fn enqueue(&self, action_id: impl Into<String>) {
        let action_id = action_id.into();
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("queued execution attempt for action {}", action_id);
        let _ = self.event_tx.send(ConsoleEvent::ExecutionQueued {
            action_id: action_id.clone(),
        });
        let _ = self.entry_tx.send(QueueEntry { action_id });
    }

    /// Cancel the in-flight entry, if one is inside its cancellable wait.
    /// Returns whether a cancellation signal was delivered. Entries past
    /// the wait are unaffected, as are pending entries (they start and can
    /// then be cancelled individually).
    pub fn cancel_current(&self) -> bool {
        match self.current_cancel.lock().expect("cancel slot lock").as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::SeqCst)
    }

    /// Queued attempts that have not finished yet, the in-flight one
    /// included.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    async fn run_entry(&self, entry: QueueEntry) {
        let Some(action) = self.registry.get(&entry.action_id) else {
            self.record_rejected_entry(
                &entry.action_id,
                "(unknown)",
                None,
                "action no longer exists in the registry",
            );
            return;
        };

        if !action.is_executable() {
            self.record_rejected_entry(
                &entry.action_id,
                &action.name,
                Some(action.kind),
                "ENV values are not executable",
            );
            return;
        }

        let message_id = self.conversation.begin_execution(&action.name, self.locale);
        self.notify(ConsoleEvent::ConversationChanged);

        let substituted = apply_env_substitution(&action.content, &self.registry.env_actions());

        let started_at = Utc::now();
        let started = Instant::now();
        let token = CancellationToken::new();
        *self.current_cancel.lock().expect("cancel slot lock") = Some(token.clone());
        self.notify(ConsoleEvent::ExecutionStarted {
            action_id: action.id.clone(),
        });

        let cancelled = tokio::select! {
            _ = token.cancelled() => true,
            _ = tokio::time::sleep(self.simulated_latency) => false,
        };

        // Past this point the entry is no longer cancellable.
        *self.current_cancel.lock().expect("cancel slot lock") = None;

        if cancelled {
            tracing::info!("execution of '{}' cancelled by user", action.name);
            self.conversation
                .cancel_execution(&message_id, &action.name, self.locale);

            let mut record = ExecutionRecord::new(&action.id, &action.name);
            record.action_kind = Some(action.kind);
            record.started_at = started_at;
            record.duration_ms = started.elapsed().as_millis() as u64;
            record.status = ExecutionStatus::Cancelled;
            record.return_code = CANCELLED_RETURN_CODE;
            record.summary = format!("cancelled after {}ms", record.duration_ms);
            record.request_snapshot = substituted;
            self.audit.append(record);

            self.notify(ConsoleEvent::ExecutionFinished {
                action_id: action.id.clone(),
                status: ExecutionStatus::Cancelled,
            });
            self.notify(ConsoleEvent::ConversationChanged);
            return;
        }

        let response = self.synthesizer.synthesize(&action, &substituted).await;
        let curl_preview = derive_curl_command(&action, &substituted);

        let mut record = ExecutionRecord::new(&action.id, &action.name);
        record.action_kind = Some(action.kind);
        record.started_at = started_at;
        record.duration_ms = response.duration_ms;
        record.status = response.status;
        record.return_code = response.return_code;
        record.summary = response.summary.clone();
        record.request_snapshot = substituted;
        record.response_snapshot = response.output_text.clone();
        self.audit.append(record);

        self.conversation
            .complete_execution(&message_id, &action.name, self.locale);
        let mut result_text = response.output_text;
        if let Some(curl) = curl_preview {
            result_text.push_str("\n\n");
            result_text.push_str(&curl);
        }
        self.conversation.push_assistant(result_text);

        self.notify(ConsoleEvent::ExecutionFinished {
            action_id: action.id.clone(),
            status: response.status,
        });
        self.notify(ConsoleEvent::ConversationChanged);
    }

    /// An entry that never reached execution still leaves an audit record;
    /// silently dropping it would make the attempt invisible.
    fn record_rejected_entry(
        &self,
        action_id: &str,
        action_name: &str,
        action_kind: Option<ActionKind>,
        reason: &str,
    ) {
        tracing::warn!("dropping queued entry for {}: {}", action_id, reason);

        let mut record = ExecutionRecord::new(action_id, action_name);
        record.action_kind = action_kind;
        record.status = ExecutionStatus::Failure;
        record.return_code = CANCELLED_RETURN_CODE;
        record.summary = reason.to_string();
        self.audit.append(record);

        self.notify(ConsoleEvent::ExecutionFinished {
            action_id: action_id.to_string(),
            status: ExecutionStatus::Failure,
        });
    }

    fn notify(&self, event: ConsoleEvent) {
        // The UI may already be gone during shutdown; dropped events are fine
        let _ = self.event_tx.send(event);
    }
}

/// Replace every literal `${ENV_NAME}` occurrence with that ENV action's
/// value. Plain textual substitution, one pass in registry order, not
/// recursive.
pub fn apply_env_substitution(content: &str, env_actions: &[Action]) -> String {
    let mut resolved = content.to_string();
    for env in env_actions {
        let pattern = format!("${{{}}}", env.name);
        if resolved.contains(&pattern) {
            resolved = resolved.replace(&pattern, &env.content);
        }
    }
    resolved
}

/// Build a curl-equivalent command for display when an API action's
/// substituted content parses as a JSON request object. Returns None on any
/// parse shortfall; the content is then shown as-is.
pub fn derive_curl_command(action: &Action, substituted_content: &str) -> Option<String> {
    if action.kind != ActionKind::Api {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(substituted_content).ok()?;
    let request = value.as_object()?;
    let url = request.get("url")?.as_str()?;
    let method = request
        .get("method")
        .and_then(|m| m.as_str())
        .map(|m| m.to_ascii_uppercase())
        .or_else(|| action.method.as_ref().map(|m| m.to_ascii_uppercase()))
        .unwrap_or_else(|| "GET".to_string());

    let mut command = format!("curl -X {} '{}'", method, url);
    if let Some(headers) = request.get("headers").and_then(|h| h.as_object()) {
        for (name, value) in headers {
            if let Some(value) = value.as_str() {
                command.push_str(&format!(" -H '{}: {}'", name, value));
            }
        }
    }
    if let Some(body) = request.get("body").filter(|b| !b.is_null()) {
        let payload = match body.as_str() {
            Some(text) => text.to_string(),
            None => body.to_string(),
        };
        command.push_str(&format!(" -d '{}'", payload));
    }

    Some(command)
}
