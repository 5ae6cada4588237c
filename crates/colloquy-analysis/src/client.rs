use crate::backends::{AnalysisBackend, OllamaBackend, OpenAiBackend};
use crate::config::{AnalysisProvider, ModelConfig};
use crate::failover::FailoverBackend;
use crate::parse::parse_analysis;
use crate::prompt::build_prompt;
use async_trait::async_trait;
use colloquy_core::{CognitiveAnalysis, ColloquyResult, Window};
use tracing::{debug, info};

/// What the dispatcher calls for each closed window.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyzes one window. Errors become fallback results upstream.
    async fn analyze(&self, window: &Window) -> ColloquyResult<CognitiveAnalysis>;
}

/// Renders a window into a prompt, sends it through a backend and parses
/// the answer.
pub struct AnalysisClient {
    backend: Box<dyn AnalysisBackend>,
}

impl AnalysisClient {
    /// Builds the backend chain described by `config`.
    ///
    /// With fallback models or a retry policy the primary model and its
    /// fallbacks are wrapped in a [`FailoverBackend`]; otherwise each window
    /// gets exactly one attempt.
    pub fn from_config(config: &ModelConfig) -> ColloquyResult<Self> {
        let primary = build_backend(config)?;
        if config.fallback_models.is_empty() && config.retry_policy.is_none() {
            return Ok(Self::with_backend(primary));
        }

        let mut backends = vec![primary];
        for fallback in &config.fallback_models {
            backends.push(build_backend(fallback)?);
        }
        let policy = config.retry_policy.clone().unwrap_or_default();
        let failover = FailoverBackend::new(backends, policy)?;
        info!(backend = failover.name(), "Analysis failover configured");
        Ok(Self::with_backend(Box::new(failover)))
    }

    /// Wraps an already built backend.
    pub fn with_backend(backend: Box<dyn AnalysisBackend>) -> Self {
        Self { backend }
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Probes the backend.
    pub async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }
}

fn build_backend(config: &ModelConfig) -> ColloquyResult<Box<dyn AnalysisBackend>> {
    Ok(match config.provider {
        AnalysisProvider::Ollama => Box::new(OllamaBackend::new(config.clone())?),
        AnalysisProvider::OpenAi => Box::new(OpenAiBackend::new(config.clone())?),
    })
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn analyze(&self, window: &Window) -> ColloquyResult<CognitiveAnalysis> {
        let prompt = build_prompt(window);
        debug!(
            session_id = %window.session_id(),
            sequence = window.sequence(),
            backend = self.backend.name(),
            "Sending window for analysis"
        );
        let answer = self.backend.complete(&prompt).await?;
        parse_analysis(&answer)
    }
}
