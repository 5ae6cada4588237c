use super::{http_client, request_error, status_error, AnalysisBackend};
use crate::config::ModelConfig;
use crate::prompt::SYSTEM_PROMPT;
use async_trait::async_trait;
use colloquy_core::{ColloquyError, ColloquyResult};
use tracing::{debug, warn};

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI and any server exposing `/v1/chat/completions`
/// (vLLM, LM Studio, Ollama's compatibility layer).
pub struct OpenAiBackend {
    config: ModelConfig,
    name: String,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Builds the backend and its HTTP client.
    pub fn new(config: ModelConfig) -> ColloquyResult<Self> {
        let http = http_client(config.timeout())?;
        Ok(Self {
            name: format!("openai/{}", config.model_id),
            config,
            http,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.config.api_key)
        }
    }
}

#[async_trait]
impl AnalysisBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> ColloquyResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
        });

        let resp = self
            .authorize(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&self.name, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| request_error(&self.name, e))?;
        if !status.is_success() {
            return Err(status_error(&self.name, status, &text));
        }

        let value: serde_json::Value = serde_json::from_str(&text)?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ColloquyError::Analysis(format!("{}: answer has no message content", self.name))
            })?;
        debug!(backend = %self.name, chars = content.len(), "Received completion");
        Ok(content.trim().to_string())
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.config.base_url());
        match self.authorize(self.http.get(&url)).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(backend = %self.name, status = %resp.status(), "Model listing failed");
                false
            }
            Err(e) => {
                warn!(backend = %self.name, error = %e, "Could not reach OpenAI-compatible API");
                false
            }
        }
    }
}
