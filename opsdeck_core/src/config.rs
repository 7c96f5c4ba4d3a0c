use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::locale::Locale;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    // Intent service (OpenAI-compatible: Ollama, LM Studio, vLLM, OpenAI, etc.)
    #[serde(default = "default_llm_url")]
    pub llm_api_url: String,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Without a credential the resolver runs in offline fallback mode.
    #[serde(default)]
    pub llm_api_key: Option<String>,

    // Display
    #[serde(default)]
    pub locale: Locale,

    // Mocked execution
    #[serde(default = "default_simulated_latency_ms")]
    pub simulated_latency_ms: u64,
}

fn default_llm_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_llm_model() -> String {
    "llama3.2".to_string()
}

fn default_simulated_latency_ms() -> u64 {
    1200
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            llm_api_url: default_llm_url(),
            llm_model: default_llm_model(),
            llm_api_key: None,
            locale: Locale::default(),
            simulated_latency_ms: default_simulated_latency_ms(),
        }
    }
}

impl ConsoleConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// Path to the config file (next to the executable)
    pub fn config_path() -> PathBuf {
        Self::get_base_dir().join("opsdeck_config.toml")
    }

    /// Load config from opsdeck_config.toml, falling back to env vars
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!("No usable config at {:?} ({}); using defaults + env vars", path, e);
                Self::from_env()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Save config to file (next to executable)
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config to {:?}", path))
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("OPSDECK_LLM_API_URL") {
            config.llm_api_url = url;
        }

        if let Ok(model) = env::var("OPSDECK_LLM_MODEL") {
            config.llm_model = model;
        }

        if let Ok(key) = env::var("OPSDECK_LLM_API_KEY") {
            if !key.trim().is_empty() {
                config.llm_api_key = Some(key);
            }
        }

        if let Ok(locale) = env::var("OPSDECK_LOCALE") {
            config.locale = Locale::parse(&locale);
        }

        if let Ok(latency) = env::var("OPSDECK_SIMULATED_LATENCY_MS") {
            if let Ok(ms) = latency.parse() {
                config.simulated_latency_ms = ms;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_roundtrip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opsdeck_config.toml");

        let mut config = ConsoleConfig::default();
        config.llm_api_key = Some("sk-test".to_string());
        config.locale = Locale::Zh;
        config.simulated_latency_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = ConsoleConfig::load_from(&path).unwrap();
        assert_eq!(loaded.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.locale, Locale::Zh);
        assert_eq!(loaded.simulated_latency_ms, 250);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ConsoleConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm_api_url, default_llm_url());
        assert_eq!(config.llm_model, default_llm_model());
        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.simulated_latency_ms, default_simulated_latency_ms());
    }
}
