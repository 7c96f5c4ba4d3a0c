//! Mock execution backend.
//!
//! The queue treats the synthesizer as a pure, always-succeeding
//! collaborator: given a substituted action it returns output text, a
//! status, a return code, a one-line summary and a duration. A real
//! backend would slot in behind the same trait and map its failures onto
//! `ExecutionStatus::Failure` without the queue changing shape.

use async_trait::async_trait;
use serde_json::json;

use crate::audit::ExecutionStatus;
use crate::registry::{Action, ActionKind};

#[derive(Debug, Clone)]
pub struct SynthesizedResponse {
    pub output_text: String,
    pub status: ExecutionStatus,
    pub return_code: i32,
    pub summary: String,
    pub duration_ms: u64,
}

#[async_trait]
pub trait ResponseSynthesizer: Send + Sync {
    async fn synthesize(&self, action: &Action, substituted_content: &str) -> SynthesizedResponse;
}

/// Deterministic stand-in for the real execution backend. All variation is
/// derived from a hash of the action id and substituted content, so the
/// same action always yields the same response.
pub struct MockSynthesizer;

impl MockSynthesizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseSynthesizer for MockSynthesizer {
    async fn synthesize(&self, action: &Action, substituted_content: &str) -> SynthesizedResponse {
        let seed = fnv1a(action.id.as_bytes()) ^ fnv1a(substituted_content.as_bytes());
        let duration_ms = 160 + seed % 440;

        match action.kind {
            ActionKind::Api => {
                let body = json!({
                    "code": 0,
                    "message": "ok",
                    "data": {
                        "requestId": format!("req-{:08x}", seed as u32),
                        "elapsedMs": duration_ms,
                    }
                });
                SynthesizedResponse {
                    output_text: serde_json::to_string_pretty(&body)
                        .unwrap_or_else(|_| body.to_string()),
                    status: ExecutionStatus::Success,
                    return_code: 200,
                    summary: format!("HTTP 200 OK in {}ms", duration_ms),
                    duration_ms,
                }
            }
            ActionKind::Script => {
                let first_line = substituted_content.lines().next().unwrap_or("").trim();
                let output_text = format!(
                    "$ {}\n{} completed without errors.\n[exit 0]",
                    first_line, action.name
                );
                SynthesizedResponse {
                    output_text,
                    status: ExecutionStatus::Success,
                    return_code: 0,
                    summary: format!("exit 0 in {}ms", duration_ms),
                    duration_ms,
                }
            }
            // Never reaches the queue's synthesize step; kept total so the
            // trait has no error channel.
            ActionKind::Env => SynthesizedResponse {
                output_text: String::new(),
                status: ExecutionStatus::Failure,
                return_code: 1,
                summary: "ENV values are not executable".to_string(),
                duration_ms: 0,
            },
        }
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ActionKind;

    #[tokio::test]
    async fn same_action_yields_identical_response() {
        let synthesizer = MockSynthesizer::new();
        let action = Action::new(ActionKind::Api, "Health", "gateway health", "{}");

        let first = synthesizer.synthesize(&action, &action.content).await;
        let second = synthesizer.synthesize(&action, &action.content).await;

        assert_eq!(first.output_text, second.output_text);
        assert_eq!(first.duration_ms, second.duration_ms);
        assert_eq!(first.return_code, second.return_code);
    }

    #[tokio::test]
    async fn api_and_script_use_matching_return_codes() {
        let synthesizer = MockSynthesizer::new();

        let api = Action::new(ActionKind::Api, "Health", "", "{}");
        let api_response = synthesizer.synthesize(&api, "{}").await;
        assert_eq!(api_response.return_code, 200);
        assert_eq!(api_response.status, ExecutionStatus::Success);

        let script = Action::new(ActionKind::Script, "Backup", "", "backup.sh --all");
        let script_response = synthesizer.synthesize(&script, "backup.sh --all").await;
        assert_eq!(script_response.return_code, 0);
        assert!(script_response.output_text.starts_with("$ backup.sh --all"));
    }
}
