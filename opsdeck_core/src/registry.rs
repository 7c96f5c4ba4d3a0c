//! In-memory catalog of registered operations.
//!
//! An [`Action`] is either directly executable (API call, script) or an
//! ENV-kind reference value used only for `${NAME}` substitution inside
//! other actions' content. The registry is read-mostly: the execution
//! pipeline consumes consistent snapshots via [`ActionRegistry::list`],
//! while the actions editor screen owns the mutating calls.

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionKind {
    Api,
    Script,
    Env,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Api => "API",
            ActionKind::Script => "SCRIPT",
            ActionKind::Env => "ENV",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    pub name: String,
    pub description: String,
    /// URL or request template for API, source text for SCRIPT, the literal
    /// value for ENV.
    pub content: String,
    /// HTTP verb, present only for API-kind actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Action {
    pub fn new(
        kind: ActionKind,
        name: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            name: name.into(),
            description: description.into(),
            content: content.into(),
            method: None,
            tags: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// ENV-kind actions are substitution sources, never executable.
    pub fn is_executable(&self) -> bool {
        self.kind != ActionKind::Env
    }
}

/// Catalog of actions. Insertion order is preserved: "registry order" is
/// what the resolver's suggestion lists and ENV substitution rely on.
pub struct ActionRegistry {
    actions: RwLock<Vec<Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(Vec::new()),
        }
    }

    /// A registry pre-seeded with a demo catalog. There is no persistent
    /// store in this console, so a fresh session starts from these.
    pub fn with_samples() -> Self {
        let registry = Self::new();
        registry.add(
            Action::new(
                ActionKind::Api,
                "Service Health",
                "Check the aggregated health endpoint of the ops gateway",
                r#"{"method": "GET", "url": "${OPS_GATEWAY}/api/v1/health"}"#,
            )
            .with_method("GET")
            .with_tags(["monitoring", "health"]),
        );
        registry.add(
            Action::new(
                ActionKind::Api,
                "Restart Payment Service",
                "Rolling restart of the payment service behind the gateway",
                r#"{"method": "POST", "url": "${OPS_GATEWAY}/api/v1/services/payment/restart", "headers": {"Authorization": "Bearer ${API_TOKEN}"}, "body": {"strategy": "rolling"}}"#,
            )
            .with_method("POST")
            .with_tags(["payments", "restart"]),
        );
        registry.add(
            Action::new(
                ActionKind::Script,
                "Database Backup",
                "Dump the orders database to the backup volume",
                "pg_dump --format=custom --file=/backups/orders.dump orders",
            )
            .with_tags(["database", "backup"]),
        );
        registry.add(
            Action::new(
                ActionKind::Script,
                "Rotate Access Logs",
                "Compress and rotate nginx access logs on the edge nodes",
                "logrotate -f /etc/logrotate.d/nginx",
            )
            .with_tags(["logs", "maintenance"]),
        );
        registry.add(Action::new(
            ActionKind::Env,
            "OPS_GATEWAY",
            "Base URL of the internal ops gateway",
            "https://gateway.internal.example",
        ));
        registry.add(Action::new(
            ActionKind::Env,
            "API_TOKEN",
            "Service token for gateway calls",
            "demo-token-1234",
        ));
        registry
    }

    /// Consistent snapshot of the whole catalog, in registry order.
    pub fn list(&self) -> Vec<Action> {
        self.actions.read().expect("action registry lock").clone()
    }

    /// Snapshot of the executable (non-ENV) actions, in registry order.
    pub fn executable(&self) -> Vec<Action> {
        self.actions
            .read()
            .expect("action registry lock")
            .iter()
            .filter(|a| a.is_executable())
            .cloned()
            .collect()
    }

    /// Snapshot of the ENV-kind actions, in registry order.
    pub fn env_actions(&self) -> Vec<Action> {
        self.actions
            .read()
            .expect("action registry lock")
            .iter()
            .filter(|a| a.kind == ActionKind::Env)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Action> {
        self.actions
            .read()
            .expect("action registry lock")
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn add(&self, action: Action) {
        tracing::info!("registered action '{}' ({})", action.name, action.kind);
        self.actions.write().expect("action registry lock").push(action);
    }

    /// Replace the action with the same id. Returns false if no such action
    /// exists.
    pub fn update(&self, action: Action) -> bool {
        let mut actions = self.actions.write().expect("action registry lock");
        match actions.iter_mut().find(|a| a.id == action.id) {
            Some(slot) => {
                *slot = action;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut actions = self.actions.write().expect("action registry lock");
        let before = actions.len();
        actions.retain(|a| a.id != id);
        before != actions.len()
    }

    pub fn len(&self) -> usize {
        self.actions.read().expect("action registry lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_remove_roundtrip() {
        let registry = ActionRegistry::new();
        let action = Action::new(ActionKind::Script, "Backup", "nightly backup", "backup.sh");
        let id = action.id.clone();
        registry.add(action);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).unwrap().name, "Backup");

        assert!(registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(!registry.remove(&id));
    }

    #[test]
    fn update_replaces_matching_id() {
        let registry = ActionRegistry::new();
        let mut action = Action::new(ActionKind::Api, "Ping", "ping the gateway", "http://x");
        registry.add(action.clone());

        action.name = "Ping v2".to_string();
        assert!(registry.update(action.clone()));
        assert_eq!(registry.get(&action.id).unwrap().name, "Ping v2");

        let unknown = Action::new(ActionKind::Api, "Ghost", "", "");
        assert!(!registry.update(unknown));
    }

    #[test]
    fn executable_excludes_env_kind() {
        let registry = ActionRegistry::with_samples();
        let executable = registry.executable();
        assert!(!executable.is_empty());
        assert!(executable.iter().all(|a| a.kind != ActionKind::Env));

        let envs = registry.env_actions();
        assert!(envs.iter().all(|a| a.kind == ActionKind::Env));
        assert_eq!(registry.len(), executable.len() + envs.len());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let registry = ActionRegistry::new();
        let first = Action::new(ActionKind::Script, "a", "", "");
        let second = Action::new(ActionKind::Script, "b", "", "");
        let ids = vec![first.id.clone(), second.id.clone()];
        registry.add(first);
        registry.add(second);

        let listed: Vec<String> = registry.list().into_iter().map(|a| a.id).collect();
        assert_eq!(listed, ids);
    }
}
