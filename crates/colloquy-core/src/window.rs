use crate::event::{Event, Speaker};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Why a window was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowTrigger {
    /// The buffered span reached the configured window size.
    Threshold,
    /// An explicit flush (end of session, end of input).
    Flush,
    /// The session was idle for longer than the idle timeout and got evicted.
    IdleTimeout,
}

/// A chronologically ordered batch of events for one session.
///
/// A window is a snapshot: once emitted it is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    session_id: String,
    sequence: u64,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    trigger: WindowTrigger,
    messages: Vec<Event>,
}

impl Window {
    /// Builds a window from already sorted messages.
    ///
    /// Returns `None` for an empty message list: a window always holds at
    /// least one event. `window_start`/`window_end` are derived from the
    /// first and last message.
    pub fn new(
        session_id: impl Into<String>,
        sequence: u64,
        closed_at: Option<DateTime<Utc>>,
        trigger: WindowTrigger,
        messages: Vec<Event>,
    ) -> Option<Self> {
        let window_start = messages.first()?.timestamp();
        let window_end = messages.last()?.timestamp();
        Some(Self {
            session_id: session_id.into(),
            sequence,
            window_start,
            window_end,
            closed_at,
            trigger,
            messages,
        })
    }

    /// Session the window belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Zero-based index of this window within its session.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Earliest message timestamp.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Latest message timestamp.
    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_end
    }

    /// The cutoff instant that closed a threshold window (the timestamp of
    /// the event that made the span reach the window size). `None` for
    /// flushed windows.
    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    /// What closed the window.
    pub fn trigger(&self) -> WindowTrigger {
        self.trigger
    }

    /// Messages in ascending timestamp order.
    pub fn messages(&self) -> &[Event] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always `false` for a constructed window; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `window_end - window_start`.
    pub fn span(&self) -> TimeDelta {
        self.window_end - self.window_start
    }

    /// Number of messages authored by `speaker`.
    pub fn count_by(&self, speaker: Speaker) -> usize {
        self.messages
            .iter()
            .filter(|m| m.speaker() == speaker)
            .count()
    }

    /// The serialized form handed to the analysis service.
    pub fn payload(&self) -> WindowPayload<'_> {
        WindowPayload {
            session_id: &self.session_id,
            window_start: self.window_start,
            window_end: self.window_end,
            messages: self
                .messages
                .iter()
                .map(|m| WindowMessage {
                    speaker: m.speaker(),
                    text: m.text(),
                    timestamp: m.timestamp(),
                })
                .collect(),
        }
    }

    /// Renders the conversation as `Speaker: text` lines.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.speaker().label(), m.text()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Wire shape of a window as seen by the analysis service.
#[derive(Debug, Clone, Serialize)]
pub struct WindowPayload<'a> {
    /// Session identifier.
    pub session_id: &'a str,
    /// Earliest message timestamp.
    pub window_start: DateTime<Utc>,
    /// Latest message timestamp.
    pub window_end: DateTime<Utc>,
    /// Ordered messages.
    pub messages: Vec<WindowMessage<'a>>,
}

/// One message of a [`WindowPayload`].
#[derive(Debug, Clone, Serialize)]
pub struct WindowMessage<'a> {
    /// Who spoke.
    pub speaker: Speaker,
    /// What was said.
    pub text: &'a str,
    /// When.
    pub timestamp: DateTime<Utc>,
}
