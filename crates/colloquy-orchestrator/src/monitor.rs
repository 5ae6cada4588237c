use colloquy_core::AnalysisResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Windows handed to a dispatch worker.
    pub windows_dispatched: u64,
    /// Windows delivered to the sinks, with or without analysis.
    pub windows_delivered: u64,
    /// Windows delivered with a real analysis.
    pub analyses_succeeded: u64,
    /// Fallback results keyed by reason label.
    pub analyses_fallback: BTreeMap<String, u64>,
    /// Individual sink delivery failures.
    pub sink_errors: u64,
}

impl DispatchStats {
    /// Fallbacks across all reasons.
    pub fn total_fallbacks(&self) -> u64 {
        self.analyses_fallback.values().sum()
    }

    /// Fallbacks for one reason label, e.g. `timeout`.
    pub fn fallbacks(&self, label: &str) -> u64 {
        self.analyses_fallback.get(label).copied().unwrap_or(0)
    }
}

/// Tracks dispatch outcomes across all session workers.
pub struct DispatchMonitor {
    stats: Arc<RwLock<DispatchStats>>,
}

impl DispatchMonitor {
    /// Creates a monitor with zeroed counters.
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(DispatchStats::default())),
        }
    }

    /// Record a window handed to a worker.
    pub async fn record_dispatched(&self) {
        self.stats.write().await.windows_dispatched += 1;
    }

    /// Record a delivered window and how its analysis went.
    pub async fn record_delivery(&self, result: &AnalysisResult, sink_errors: usize) {
        let mut stats = self.stats.write().await;
        stats.windows_delivered += 1;
        stats.sink_errors += sink_errors as u64;
        match result.fallback_reason() {
            None => stats.analyses_succeeded += 1,
            Some(reason) => {
                *stats
                    .analyses_fallback
                    .entry(reason.label().to_string())
                    .or_insert(0) += 1;
            }
        }
    }

    /// Get a snapshot of the counters.
    pub async fn snapshot(&self) -> DispatchStats {
        self.stats.read().await.clone()
    }

    /// Serialize the counters as JSON.
    pub async fn to_json(&self) -> serde_json::Value {
        let stats = self.snapshot().await;
        serde_json::json!({
            "dispatch": stats,
            "fallback_total": stats.total_fallbacks(),
        })
    }
}

impl Default for DispatchMonitor {
    fn default() -> Self {
        Self::new()
    }
}
