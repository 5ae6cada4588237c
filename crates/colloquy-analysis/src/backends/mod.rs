/// Ollama `/api/generate` backend.
pub mod ollama;
/// OpenAI-compatible chat completions backend.
pub mod openai;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

use async_trait::async_trait;
use colloquy_core::{ColloquyError, ColloquyResult};
use std::time::Duration;

/// Trait for analysis provider backends.
///
/// A backend turns a fully rendered prompt into the model's raw text
/// answer. Prompt building and parsing live in
/// [`AnalysisClient`](crate::AnalysisClient), so every backend sees the same
/// prompt for the same window.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Name used in logs, usually `provider/model`.
    fn name(&self) -> &str;

    /// Sends the prompt and returns the model's text answer.
    async fn complete(&self, prompt: &str) -> ColloquyResult<String>;

    /// Whether the service is reachable and serves the configured model.
    async fn is_available(&self) -> bool;
}

pub(crate) fn http_client(timeout: Duration) -> ColloquyResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ColloquyError::Config(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn request_error(backend: &str, e: reqwest::Error) -> ColloquyError {
    if e.is_timeout() {
        ColloquyError::Timeout(format!("{backend}: request timed out"))
    } else {
        ColloquyError::Http(format!("{backend}: {e}"))
    }
}

/// Error for a non-success status. The `status NNN` form is what
/// [`is_retryable`](crate::failover::is_retryable) reads back.
pub(crate) fn status_error(
    backend: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> ColloquyError {
    ColloquyError::Http(format!(
        "{backend}: status {}: {}",
        status.as_u16(),
        body.chars().take(500).collect::<String>()
    ))
}
