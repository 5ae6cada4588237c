use crate::failover::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which API a model is served through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisProvider {
    /// A local Ollama server (`/api/generate`).
    #[default]
    Ollama,
    /// Any OpenAI-compatible chat completions API.
    OpenAi,
}

/// One model endpoint, optionally with fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API flavour.
    #[serde(default)]
    pub provider: AnalysisProvider,
    /// Model name as the provider knows it.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Bearer token; unused by Ollama.
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default base URL.
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling cutoff.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request HTTP timeout, also the dispatch timeout for a window.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Tried in order when this model keeps failing.
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    /// Retries per model; `None` means one attempt.
    #[serde(default)]
    pub retry_policy: Option<RetryPolicy>,
}

fn default_model_id() -> String {
    "qwen2.5:32b".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    200
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: AnalysisProvider::default(),
            model_id: default_model_id(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            fallback_models: Vec::new(),
            retry_policy: None,
        }
    }
}

impl ModelConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                AnalysisProvider::Ollama => "http://localhost:11434",
                AnalysisProvider::OpenAi => "https://api.openai.com",
            }
        }
    }

    /// `timeout_secs` as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fills an empty `api_key` of this model and its fallbacks from the
    /// `OPENAI_API_KEY` value, for OpenAI-compatible providers only.
    pub fn apply_api_key(&mut self, key: &str) {
        if self.provider == AnalysisProvider::OpenAi && self.api_key.is_empty() {
            self.api_key = key.to_string();
        }
        for fallback in &mut self.fallback_models {
            fallback.apply_api_key(key);
        }
    }
}

/// `[analysis]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// When false every window is delivered with a `disabled` fallback.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Primary model.
    #[serde(flatten)]
    pub model: ModelConfig,
}

fn default_enabled() -> bool {
    true
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            model: ModelConfig::default(),
        }
    }
}
