//! Natural-language intent resolution.
//!
//! `resolve` maps free text onto the catalog of executable actions and
//! never raises: when the remote intent service is unconfigured, unreachable
//! or returns a shape that fails validation, the deterministic offline
//! fallback answers instead. ENV-kind actions are filtered out before
//! either path runs; they can never appear as a match or a suggestion.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::ConsoleConfig;
use crate::llm_client::{LlmClient, Message};
use crate::locale::Locale;
use crate::registry::Action;

/// Minimum confidence the remote service is instructed to require before
/// committing to a direct match.
pub const DIRECT_MATCH_CONFIDENCE_THRESHOLD: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResolution {
    pub matched_action_id: Option<String>,
    /// Relevance-ordered; empty means no suggestions.
    pub suggested_action_ids: Vec<String>,
    pub reply: String,
    pub confidence: f32,
}

/// Wire shape of the remote service's structured reply.
#[derive(Debug, Deserialize)]
struct RemoteIntentReply {
    #[serde(rename = "matchedConfigId")]
    matched_config_id: Option<String>,
    #[serde(rename = "suggestedConfigIds")]
    suggested_config_ids: Option<Vec<String>>,
    reply: String,
    confidence: f32,
}

pub struct IntentResolver {
    llm: Option<LlmClient>,
}

impl IntentResolver {
    pub fn from_config(config: &ConsoleConfig) -> Self {
        let llm = match &config.llm_api_key {
            Some(key) if !key.trim().is_empty() => Some(LlmClient::new(
                config.llm_api_url.clone(),
                key.clone(),
                config.llm_model.clone(),
            )),
            _ => {
                tracing::info!("no intent service credential configured; offline fallback only");
                None
            }
        };
        Self { llm }
    }

    /// A resolver that always answers from the offline fallback.
    pub fn offline() -> Self {
        Self { llm: None }
    }

    /// Resolve user text against the registry snapshot. Always returns a
    /// result; remote failures degrade to the offline fallback.
    pub async fn resolve(
        &self,
        user_text: &str,
        actions: &[Action],
        locale: Locale,
    ) -> IntentResolution {
        let candidates: Vec<Action> = actions
            .iter()
            .filter(|a| a.is_executable())
            .cloned()
            .collect();

        if let Some(client) = &self.llm {
            match resolve_remote(client, user_text, &candidates, locale).await {
                Ok(resolution) => return resolution,
                Err(e) => {
                    tracing::warn!("remote intent resolution failed, answering offline: {:#}", e)
                }
            }
        }

        fallback_resolve(user_text, &candidates, locale)
    }
}

async fn resolve_remote(
    client: &LlmClient,
    user_text: &str,
    candidates: &[Action],
    locale: Locale,
) -> Result<IntentResolution> {
    let catalog = candidates
        .iter()
        .map(|a| {
            format!(
                "- id: {} | name: {} | kind: {} | tags: {} | description: {}",
                a.id,
                a.name,
                a.kind,
                a.tags.join(","),
                a.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "You are the intent router of an operations console. Map the user's \
         request onto the catalog of registered operations below.\n\n\
         Catalog:\n{catalog}\n\n\
         Decide on exactly one of three outcomes:\n\
         1. Direct match: you are at least {threshold:.0}% confident that \
         exactly one operation is meant. Set matchedConfigId to its id and \
         suggestedConfigIds to null.\n\
         2. Suggestions: the request is broad or ambiguous. Set \
         matchedConfigId to null and list every relevant operation id in \
         suggestedConfigIds, most relevant first.\n\
         3. No match: nothing fits. Set both fields to null.\n\n\
         Respond with JSON only, no prose:\n\
         {{\"matchedConfigId\": string|null, \"suggestedConfigIds\": \
         string[]|null, \"reply\": string, \"confidence\": number}}\n\n\
         \"reply\" is the short message shown to the user; write it in \
         locale \"{locale}\". \"confidence\" is between 0 and 1.",
        catalog = catalog,
        threshold = DIRECT_MATCH_CONFIDENCE_THRESHOLD * 100.0,
        locale = locale.tag(),
    );

    let raw: RemoteIntentReply = client
        .generate_json(vec![Message::system(system), Message::user(user_text)])
        .await?;

    normalize_remote_reply(raw, candidates)
}

/// Validate and normalize the duck-shaped remote reply into a tagged
/// result. Any validation failure is an error so the caller falls back.
fn normalize_remote_reply(
    raw: RemoteIntentReply,
    candidates: &[Action],
) -> Result<IntentResolution> {
    let matched_action_id = raw.matched_config_id.filter(|id| {
        let trimmed = id.trim();
        !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null")
    });

    if let Some(id) = &matched_action_id {
        if !candidates.iter().any(|a| &a.id == id) {
            bail!("remote resolver matched unknown action id '{}'", id);
        }
    }

    let suggested_action_ids: Vec<String> = raw
        .suggested_config_ids
        .unwrap_or_default()
        .into_iter()
        .filter(|id| {
            let known = candidates.iter().any(|a| &a.id == id);
            if !known {
                tracing::debug!("dropping unknown suggested action id '{}'", id);
            }
            known
        })
        .collect();

    Ok(IntentResolution {
        matched_action_id,
        suggested_action_ids,
        reply: raw.reply,
        confidence: raw.confidence.clamp(0.0, 1.0),
    })
}

/// Deterministic offline resolution. Given the same candidate snapshot,
/// input and locale this returns byte-identical results, which is what the
/// unit tests pin down.
pub fn fallback_resolve(user_text: &str, candidates: &[Action], locale: Locale) -> IntentResolution {
    let lowered = user_text.to_lowercase();

    if locale
        .catalog_keywords()
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        return IntentResolution {
            matched_action_id: None,
            suggested_action_ids: candidates.iter().map(|a| a.id.clone()).collect(),
            reply: locale.offline_catalog_reply().to_string(),
            confidence: 1.0,
        };
    }

    let tokens: Vec<&str> = lowered
        .split_whitespace()
        .filter(|token| token.chars().count() > 1)
        .collect();

    let matches: Vec<&Action> = candidates
        .iter()
        .filter(|action| {
            let haystack = format!(
                "{} {} {} {}",
                action.name,
                action.description,
                action.kind,
                action.tags.join(" ")
            )
            .to_lowercase();
            tokens.iter().any(|token| haystack.contains(token))
        })
        .collect();

    match matches.as_slice() {
        [single] => IntentResolution {
            matched_action_id: Some(single.id.clone()),
            suggested_action_ids: Vec::new(),
            reply: locale.offline_matched_reply(&single.name),
            confidence: 0.8,
        },
        [] => IntentResolution {
            matched_action_id: None,
            suggested_action_ids: Vec::new(),
            reply: locale.offline_no_match_reply().to_string(),
            confidence: 0.0,
        },
        several => IntentResolution {
            matched_action_id: None,
            suggested_action_ids: several.iter().map(|a| a.id.clone()).collect(),
            reply: locale.offline_ambiguous_reply().to_string(),
            confidence: 0.7,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ActionKind;

    fn sample_actions() -> Vec<Action> {
        vec![
            Action::new(
                ActionKind::Api,
                "Service Health",
                "Check the gateway health endpoint",
                "{}",
            )
            .with_tags(["monitoring"]),
            Action::new(
                ActionKind::Script,
                "Database Backup",
                "Dump the orders database",
                "pg_dump orders",
            )
            .with_tags(["database", "backup"]),
            Action::new(
                ActionKind::Env,
                "OPS_GATEWAY",
                "Base URL of the gateway",
                "https://gateway.internal.example",
            ),
        ]
    }

    fn executable(actions: &[Action]) -> Vec<Action> {
        actions.iter().filter(|a| a.is_executable()).cloned().collect()
    }

    #[tokio::test]
    async fn catalog_keyword_suggests_every_executable_action() {
        let actions = sample_actions();
        let resolver = IntentResolver::offline();
        let resolution = resolver
            .resolve("list all commands", &actions, Locale::En)
            .await;

        assert_eq!(resolution.matched_action_id, None);
        assert_eq!(resolution.confidence, 1.0);
        let expected: Vec<String> = executable(&actions).iter().map(|a| a.id.clone()).collect();
        assert_eq!(resolution.suggested_action_ids, expected);
    }

    #[tokio::test]
    async fn single_candidate_becomes_direct_match() {
        let actions = vec![Action::new(
            ActionKind::Script,
            "Database Backup",
            "Dump the orders database",
            "pg_dump orders",
        )];
        let resolver = IntentResolver::offline();
        let resolution = resolver
            .resolve("run database backup", &actions, Locale::En)
            .await;

        assert_eq!(
            resolution.matched_action_id.as_deref(),
            Some(actions[0].id.as_str())
        );
        assert_eq!(resolution.confidence, 0.8);
        assert!(resolution.suggested_action_ids.is_empty());
    }

    #[test]
    fn multiple_candidates_become_suggestions_in_registry_order() {
        let actions = sample_actions();
        let candidates = executable(&actions);
        // "database" hits the backup, "health" hits the health check
        let resolution = fallback_resolve("database health", &candidates, Locale::En);

        assert_eq!(resolution.matched_action_id, None);
        assert_eq!(resolution.confidence, 0.7);
        let expected: Vec<String> = candidates.iter().map(|a| a.id.clone()).collect();
        assert_eq!(resolution.suggested_action_ids, expected);
    }

    #[test]
    fn unrecognized_input_returns_nothing() {
        let candidates = executable(&sample_actions());
        let resolution = fallback_resolve("qqqq zzzz", &candidates, Locale::En);

        assert_eq!(resolution.matched_action_id, None);
        assert!(resolution.suggested_action_ids.is_empty());
        assert_eq!(resolution.confidence, 0.0);
        assert_eq!(resolution.reply, Locale::En.offline_no_match_reply());
    }

    #[test]
    fn short_tokens_are_discarded() {
        let candidates = executable(&sample_actions());
        // "a" and "x" are dropped outright; "zz" survives but matches nothing
        let resolution = fallback_resolve("a x zz", &candidates, Locale::En);
        assert_eq!(resolution.confidence, 0.0);
    }

    #[tokio::test]
    async fn env_actions_never_resolve() {
        let actions = sample_actions();
        let env_id = actions
            .iter()
            .find(|a| a.kind == ActionKind::Env)
            .map(|a| a.id.clone())
            .unwrap();
        let resolver = IntentResolver::offline();

        // The ENV action's name is a perfect token match; it must still be
        // invisible to resolution.
        let resolution = resolver.resolve("ops_gateway", &actions, Locale::En).await;
        assert_ne!(resolution.matched_action_id.as_deref(), Some(env_id.as_str()));
        assert!(!resolution.suggested_action_ids.contains(&env_id));

        let catalog = resolver.resolve("list", &actions, Locale::En).await;
        assert!(!catalog.suggested_action_ids.contains(&env_id));
    }

    #[test]
    fn fallback_is_deterministic() {
        let candidates = executable(&sample_actions());
        let first = fallback_resolve("backup the database", &candidates, Locale::En);
        for _ in 0..5 {
            let again = fallback_resolve("backup the database", &candidates, Locale::En);
            assert_eq!(again, first);
        }
    }

    #[test]
    fn normalize_treats_null_literal_as_absent() {
        let candidates = executable(&sample_actions());
        let raw = RemoteIntentReply {
            matched_config_id: Some("null".to_string()),
            suggested_config_ids: None,
            reply: "nothing fits".to_string(),
            confidence: 0.2,
        };
        let resolution = normalize_remote_reply(raw, &candidates).unwrap();
        assert_eq!(resolution.matched_action_id, None);
    }

    #[test]
    fn normalize_rejects_unknown_matched_id() {
        let candidates = executable(&sample_actions());
        let raw = RemoteIntentReply {
            matched_config_id: Some("not-a-real-id".to_string()),
            suggested_config_ids: None,
            reply: "sure".to_string(),
            confidence: 0.9,
        };
        assert!(normalize_remote_reply(raw, &candidates).is_err());
    }

    #[test]
    fn normalize_drops_unknown_suggestions_and_clamps_confidence() {
        let candidates = executable(&sample_actions());
        let known = candidates[0].id.clone();
        let raw = RemoteIntentReply {
            matched_config_id: None,
            suggested_config_ids: Some(vec![known.clone(), "ghost".to_string()]),
            reply: "a couple of options".to_string(),
            confidence: 1.7,
        };
        let resolution = normalize_remote_reply(raw, &candidates).unwrap();
        assert_eq!(resolution.suggested_action_ids, vec![known]);
        assert_eq!(resolution.confidence, 1.0);
    }
}
