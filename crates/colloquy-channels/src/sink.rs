use async_trait::async_trait;
use colloquy_core::{AnalysisResult, ColloquyResult, Window};
use serde::{Deserialize, Serialize};

/// A closed window together with its analysis outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowReport {
    /// The closed window.
    pub window: Window,
    /// Its analysis or the fallback that replaced it.
    pub analysis: AnalysisResult,
}

impl WindowReport {
    /// Pairs a window with its outcome.
    pub fn new(window: Window, analysis: AnalysisResult) -> Self {
        Self { window, analysis }
    }
}

/// Consumer of window reports.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;
    /// Delivers one report. Called once per closed window.
    async fn deliver(&self, report: &WindowReport) -> ColloquyResult<()>;
}
