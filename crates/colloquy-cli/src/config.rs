use colloquy_analysis::AnalysisSettings;
use colloquy_engine::EngineSettings;
use colloquy_orchestrator::SourceSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Contents of `colloquy.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ColloquyConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub sink: SinkSettings,
    #[serde(default)]
    pub shutdown: ShutdownSettings,
}

#[derive(Debug, Deserialize)]
pub struct SinkSettings {
    #[serde(default = "default_console")]
    pub console: bool,
    #[serde(default)]
    pub jsonl_path: Option<PathBuf>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            console: default_console(),
            jsonl_path: None,
        }
    }
}

fn default_console() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ShutdownSettings {
    /// How long pending analyses may run after input ends.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: f64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
        }
    }
}

fn default_grace_secs() -> f64 {
    10.0
}

impl ShutdownSettings {
    pub fn grace(&self) -> anyhow::Result<Duration> {
        Ok(colloquy_engine::config::secs_to_duration(
            "shutdown.grace_secs",
            self.grace_secs,
        )?)
    }
}

impl ColloquyConfig {
    /// Reads the config file. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => toml::from_str(&text).map_err(|e| {
                anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            )),
        }
    }
}
