use chrono::TimeDelta;
use colloquy_core::{ColloquyError, ColloquyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Validated engine configuration, fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    window_size: TimeDelta,
    allowed_lateness: Option<TimeDelta>,
    idle_timeout: Option<Duration>,
}

impl EngineConfig {
    /// Creates a config with the given window size. Sub-second sizes are allowed.
    pub fn new(window_size: Duration) -> ColloquyResult<Self> {
        if window_size.is_zero() {
            return Err(ColloquyError::Config("window size must be > 0".into()));
        }
        Ok(Self {
            window_size: to_delta("window size", window_size)?,
            allowed_lateness: None,
            idle_timeout: None,
        })
    }

    /// Creates a config from a window size in (fractional) seconds.
    pub fn from_secs_f64(window_size_secs: f64) -> ColloquyResult<Self> {
        Self::new(secs_to_duration("window_size_secs", window_size_secs)?)
    }

    /// Rejects events older than the session's last cutoff minus `lateness`.
    pub fn with_allowed_lateness(mut self, lateness: Duration) -> ColloquyResult<Self> {
        self.allowed_lateness = Some(to_delta("allowed lateness", lateness)?);
        Ok(self)
    }

    /// Flushes and evicts sessions idle for at least `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Span at which a window closes.
    pub fn window_size(&self) -> TimeDelta {
        self.window_size
    }

    /// Out-of-order tolerance, if late events are policed.
    pub fn allowed_lateness(&self) -> Option<TimeDelta> {
        self.allowed_lateness
    }

    /// Idle timeout, if idle sessions are swept.
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout
    }
}

/// `[engine]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Window size in seconds; fractional values allowed.
    #[serde(default = "default_window_size_secs")]
    pub window_size_secs: f64,
    /// Out-of-order tolerance in seconds. Unset: every event is accepted.
    #[serde(default)]
    pub allowed_lateness_secs: Option<f64>,
    /// Idle timeout in seconds. Unset: sessions live for the process lifetime.
    #[serde(default)]
    pub idle_timeout_secs: Option<f64>,
    /// How often the pipeline runs the idle sweep, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: f64,
}

fn default_window_size_secs() -> f64 {
    30.0
}

fn default_sweep_interval_secs() -> f64 {
    5.0
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            window_size_secs: default_window_size_secs(),
            allowed_lateness_secs: None,
            idle_timeout_secs: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl EngineSettings {
    /// Validates the settings into an [`EngineConfig`].
    pub fn to_engine_config(&self) -> ColloquyResult<EngineConfig> {
        let mut config = EngineConfig::from_secs_f64(self.window_size_secs)?;
        if let Some(secs) = self.allowed_lateness_secs {
            let lateness = secs_to_duration("allowed_lateness_secs", secs)?;
            config = config.with_allowed_lateness(lateness)?;
        }
        if let Some(secs) = self.idle_timeout_secs {
            config = config.with_idle_timeout(secs_to_duration("idle_timeout_secs", secs)?);
        }
        Ok(config)
    }

    /// Idle sweep period.
    pub fn sweep_interval(&self) -> ColloquyResult<Duration> {
        let interval = secs_to_duration("sweep_interval_secs", self.sweep_interval_secs)?;
        if interval.is_zero() {
            return Err(ColloquyError::Config("sweep_interval_secs must be > 0".into()));
        }
        Ok(interval)
    }
}

/// Converts a non-negative, finite number of seconds into a [`Duration`].
pub fn secs_to_duration(name: &str, secs: f64) -> ColloquyResult<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ColloquyError::Config(format!(
            "{name} must be a finite, non-negative number of seconds (got {secs})"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ColloquyError::Config(format!("{name}: {e}")))
}

fn to_delta(name: &str, duration: Duration) -> ColloquyResult<TimeDelta> {
    TimeDelta::from_std(duration)
        .map_err(|e| ColloquyError::Config(format!("{name} out of range: {e}")))
}
