use super::{http_client, request_error, status_error, AnalysisBackend};
use crate::config::ModelConfig;
use async_trait::async_trait;
use colloquy_core::{ColloquyError, ColloquyResult};
use std::time::Duration;
use tracing::{debug, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Local Ollama server backend (`POST /api/generate`, non-streaming).
pub struct OllamaBackend {
    config: ModelConfig,
    name: String,
    http: reqwest::Client,
}

impl OllamaBackend {
    /// Builds the backend and its HTTP client.
    pub fn new(config: ModelConfig) -> ColloquyResult<Self> {
        let http = http_client(config.timeout())?;
        Ok(Self {
            name: format!("ollama/{}", config.model_id),
            config,
            http,
        })
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model_id,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "top_p": self.config.top_p,
                "num_predict": self.config.max_tokens,
            }
        })
    }
}

#[async_trait]
impl AnalysisBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, prompt: &str) -> ColloquyResult<String> {
        let url = format!("{}/api/generate", self.config.base_url());
        let resp = self
            .http
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| request_error(&self.name, e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| request_error(&self.name, e))?;
        if !status.is_success() {
            return Err(status_error(&self.name, status, &body));
        }

        let value: serde_json::Value = serde_json::from_str(&body)?;
        let text = value
            .get("response")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                ColloquyError::Analysis(format!("{}: answer has no 'response' field", self.name))
            })?;
        debug!(backend = %self.name, chars = text.len(), "Received completion");
        Ok(text.trim().to_string())
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url());
        let resp = match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(backend = %self.name, status = %resp.status(), "Ollama probe failed");
                return false;
            }
            Err(e) => {
                warn!(backend = %self.name, error = %e, "Could not connect to Ollama");
                return false;
            }
        };
        let Ok(tags) = resp.json::<serde_json::Value>().await else {
            return false;
        };
        tags.get("models")
            .and_then(serde_json::Value::as_array)
            .is_some_and(|models| {
                models.iter().any(|m| {
                    m.get("name").and_then(serde_json::Value::as_str)
                        == Some(self.config.model_id.as_str())
                })
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> OllamaBackend {
        OllamaBackend::new(ModelConfig {
            api_base_url: Some(server.uri()),
            ..ModelConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_request_and_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "qwen2.5:32b",
                "stream": false,
                "options": {"num_predict": 200}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "qwen2.5:32b",
                "response": "  {\"response\": \"hi\"}  ",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = backend(&server).complete("prompt").await.unwrap();
        assert_eq!(text, "{\"response\": \"hi\"}");
    }

    #[tokio::test]
    async fn test_error_status_carries_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("loading model"))
            .mount(&server)
            .await;

        let err = backend(&server).complete("prompt").await.unwrap_err();
        assert!(matches!(err, ColloquyError::Http(_)));
        assert!(err.to_string().contains("status 503"));
    }

    #[tokio::test]
    async fn test_availability_checks_model_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3:8b"}, {"name": "qwen2.5:32b"}]
            })))
            .mount(&server)
            .await;
        assert!(backend(&server).is_available().await);

        let other = OllamaBackend::new(ModelConfig {
            api_base_url: Some(server.uri()),
            model_id: "mistral".into(),
            ..ModelConfig::default()
        })
        .unwrap();
        assert!(!other.is_available().await);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let backend = OllamaBackend::new(ModelConfig {
            api_base_url: Some("http://127.0.0.1:9".into()),
            ..ModelConfig::default()
        })
        .unwrap();
        assert!(!backend.is_available().await);
    }
}
