//! Append-only audit trail of execution attempts.
//!
//! Exactly one record is written per dequeued entry, cancelled attempts
//! included. Records are immutable once appended and live for the rest of
//! the process; the monitoring screen reads snapshots.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::ActionKind;

/// Sentinel return code for attempts that never produced a real one.
pub const CANCELLED_RETURN_CODE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Success,
    Failure,
    Cancelled,
}

impl ExecutionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failure => "FAILURE",
            ExecutionStatus::Cancelled => "CANCELLED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub action_id: String,
    pub action_name: String,
    /// None when the action had already vanished from the registry by the
    /// time its entry was dequeued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_kind: Option<ActionKind>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: ExecutionStatus,
    /// HTTP-style for API actions, process-exit-style for scripts, -1 for
    /// cancelled attempts.
    pub return_code: i32,
    pub summary: String,
    /// What was sent/run, after variable substitution.
    pub request_snapshot: String,
    pub response_snapshot: String,
}

impl ExecutionRecord {
    pub fn new(action_id: impl Into<String>, action_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_id: action_id.into(),
            action_name: action_name.into(),
            action_kind: None,
            started_at: Utc::now(),
            duration_ms: 0,
            status: ExecutionStatus::Failure,
            return_code: CANCELLED_RETURN_CODE,
            summary: String::new(),
            request_snapshot: String::new(),
            response_snapshot: String::new(),
        }
    }
}

/// Fire-and-forget sink; append never fails and requires no acknowledgement.
pub struct AuditLog {
    records: RwLock<Vec<ExecutionRecord>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn append(&self, record: ExecutionRecord) {
        tracing::debug!(
            "audit: {} '{}' -> {} (rc {})",
            record.action_id,
            record.action_name,
            record.status.label(),
            record.return_code
        );
        self.records.write().expect("audit log lock").push(record);
    }

    /// Snapshot in append order (oldest first).
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.records.read().expect("audit log lock").clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("audit log lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let log = AuditLog::new();
        for name in ["first", "second", "third"] {
            log.append(ExecutionRecord::new("a-1", name));
        }

        let names: Vec<String> = log.records().into_iter().map(|r| r.action_name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn snapshots_do_not_alias_the_log() {
        let log = AuditLog::new();
        log.append(ExecutionRecord::new("a-1", "probe"));

        let mut snapshot = log.records();
        snapshot[0].action_name = "mutated".to_string();
        assert_eq!(log.records()[0].action_name, "probe");
    }
}
