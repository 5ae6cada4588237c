use chrono::{DateTime, Utc};
use colloquy_core::{Event, Speaker};

/// An event together with its arrival sequence number within its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedEvent {
    /// Arrival order within the session, shared by both speaker buffers.
    pub seq: u64,
    /// The buffered event.
    pub event: Event,
}

/// Ordered store of pending events for one (session, speaker) pair.
///
/// Events are kept in arrival order, which is not necessarily timestamp
/// order. Duplicates are retained.
#[derive(Debug, Clone)]
pub struct SpeakerBuffer {
    speaker: Speaker,
    events: Vec<BufferedEvent>,
}

impl SpeakerBuffer {
    /// Creates an empty buffer for `speaker`.
    pub fn new(speaker: Speaker) -> Self {
        Self {
            speaker,
            events: Vec::new(),
        }
    }

    /// The role this buffer holds.
    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    /// Appends an event. O(1) amortized.
    pub fn append(&mut self, entry: BufferedEvent) {
        debug_assert_eq!(entry.event.speaker(), self.speaker);
        self.events.push(entry);
    }

    /// Read-only view of the buffered events in arrival order.
    ///
    /// The iterator is lazy; call again to restart.
    pub fn peek_all(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().map(|e| &e.event)
    }

    /// Buffered entries with their sequence numbers.
    pub fn entries(&self) -> &[BufferedEvent] {
        &self.events
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// `true` when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Smallest buffered timestamp.
    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.event.timestamp()).min()
    }

    /// Largest buffered timestamp.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.events.iter().map(|e| e.event.timestamp()).max()
    }

    /// Removes and returns every event with `timestamp <= cutoff`.
    pub fn drain_up_to(&mut self, cutoff: DateTime<Utc>) -> Vec<BufferedEvent> {
        self.drain_where(|ts| ts <= cutoff)
    }

    /// Removes and returns every event with `timestamp < cutoff`.
    pub fn drain_before(&mut self, cutoff: DateTime<Utc>) -> Vec<BufferedEvent> {
        self.drain_where(|ts| ts < cutoff)
    }

    /// Removes and returns everything.
    pub fn drain_all(&mut self) -> Vec<BufferedEvent> {
        std::mem::take(&mut self.events)
    }

    // Both halves keep arrival order.
    fn drain_where(&mut self, take: impl Fn(DateTime<Utc>) -> bool) -> Vec<BufferedEvent> {
        let (drained, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|e| take(e.event.timestamp()));
        self.events = kept;
        drained
    }
}
