//! Thin client for an OpenAI-compatible chat-completions endpoint
//! (Ollama, LM Studio, vLLM, OpenAI, etc.), used by the intent resolver.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl LlmClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            api_url,
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    /// Generate a completion and return the raw assistant text.
    pub async fn generate(&self, messages: Vec<Message>) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.1),
            max_tokens: Some(600),
        };

        let mut req = self.client.post(&url).json(&request);
        // API key header is optional for local models
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = req.send().await.context("Failed to send intent request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("Intent service returned error {}: {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse intent service response")?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("Empty response from intent service"))
    }

    /// Generate a completion and deserialize it as JSON, tolerating models
    /// that wrap the payload in markdown fences or reasoning tags.
    pub async fn generate_json<T>(&self, messages: Vec<Message>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let raw = self.generate(messages).await?;
        let payload = extract_json_payload(&raw);
        serde_json::from_str::<T>(payload).with_context(|| {
            format!(
                "Failed to parse JSON from intent service. Extracted: {} | Raw: {}",
                payload,
                raw.chars().take(500).collect::<String>()
            )
        })
    }
}

/// Pull the JSON object out of a model reply that may carry a `</think>`
/// preamble, a ```json fence, or leading/trailing prose.
fn extract_json_payload(raw: &str) -> &str {
    let cleaned = match raw.rfind("</think>") {
        Some(end) => &raw[end + "</think>".len()..],
        None => raw,
    };
    let cleaned = cleaned.trim();

    if let Some(start) = cleaned.find("```json") {
        let after_fence = &cleaned[start + "```json".len()..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            return &cleaned[start..=end];
        }
    }

    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_json() {
        assert_eq!(extract_json_payload(r#"{"a": 1}"#), r#"{"a": 1}"#);
    }

    #[test]
    fn extracts_from_markdown_fence() {
        let raw = "Here you go:\n```json\n{\"a\": 1}\n```\nanything else";
        assert_eq!(extract_json_payload(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn extracts_from_surrounding_prose() {
        let raw = "The answer is {\"a\": 1} as requested.";
        assert_eq!(extract_json_payload(raw), r#"{"a": 1}"#);
    }

    #[test]
    fn strips_reasoning_preamble() {
        let raw = "<think>deliberating...</think>\n{\"a\": 1}";
        assert_eq!(extract_json_payload(raw), r#"{"a": 1}"#);
    }
}
