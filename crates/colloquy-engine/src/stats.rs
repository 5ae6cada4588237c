use serde::{Deserialize, Serialize};

/// Counters maintained by the windowing engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Events that entered a buffer.
    pub events_accepted: u64,
    /// Records rejected as malformed.
    pub events_rejected: u64,
    /// Events rejected as late.
    pub events_late: u64,
    /// Windows closed by the span threshold.
    pub windows_emitted: u64,
    /// Windows closed by a flush or an idle sweep.
    pub windows_flushed: u64,
    /// Sessions created on first contact.
    pub sessions_created: u64,
    /// Sessions evicted by the idle sweep.
    pub sessions_evicted: u64,
}

impl EngineStats {
    /// All windows, whatever closed them.
    pub fn total_windows(&self) -> u64 {
        self.windows_emitted + self.windows_flushed
    }

    /// JSON snapshot for logs and summaries.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "events": {
                "accepted": self.events_accepted,
                "rejected": self.events_rejected,
                "late": self.events_late,
            },
            "windows": {
                "threshold": self.windows_emitted,
                "flushed": self.windows_flushed,
                "total": self.total_windows(),
            },
            "sessions": {
                "created": self.sessions_created,
                "evicted": self.sessions_evicted,
            },
        })
    }
}
