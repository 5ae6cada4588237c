use crate::buffer::{BufferedEvent, SpeakerBuffer};
use chrono::{DateTime, TimeDelta, Utc};
use colloquy_core::{Event, Speaker};
use std::time::{Duration, Instant};

/// Windowing phase of one session, derived from its buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing buffered.
    Empty,
    /// Events buffered, span below the window size.
    Accumulating,
    /// Span reached the window size; a window is due.
    Ready,
}

/// State of one conversation session: one buffer per speaker role.
#[derive(Debug)]
pub struct SessionState {
    session_id: String,
    customer: SpeakerBuffer,
    agent: SpeakerBuffer,
    next_seq: u64,
    windows_emitted: u64,
    last_cutoff: Option<DateTime<Utc>>,
    last_activity: Instant,
}

impl SessionState {
    /// Creates a session with two empty buffers.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::resume(session_id, 0)
    }

    /// Creates a session whose first window gets sequence `next_window`.
    pub fn resume(session_id: impl Into<String>, next_window: u64) -> Self {
        Self {
            session_id: session_id.into(),
            customer: SpeakerBuffer::new(Speaker::Customer),
            agent: SpeakerBuffer::new(Speaker::Agent),
            next_seq: 0,
            windows_emitted: next_window,
            last_cutoff: None,
            last_activity: Instant::now(),
        }
    }

    /// Session identifier.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Routes the event to its speaker's buffer and stamps its arrival
    /// sequence. Returns the sequence number.
    pub fn append(&mut self, event: Event) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.last_activity = Instant::now();
        self.buffer_mut(event.speaker())
            .append(BufferedEvent { seq, event });
        seq
    }

    /// The buffer for `speaker`.
    pub fn buffer(&self, speaker: Speaker) -> &SpeakerBuffer {
        match speaker {
            Speaker::Customer => &self.customer,
            Speaker::Agent => &self.agent,
        }
    }

    /// Mutable access to the buffer for `speaker`.
    pub fn buffer_mut(&mut self, speaker: Speaker) -> &mut SpeakerBuffer {
        match speaker {
            Speaker::Customer => &mut self.customer,
            Speaker::Agent => &mut self.agent,
        }
    }

    /// Total number of buffered events across both speakers.
    pub fn buffered_len(&self) -> usize {
        self.customer.len() + self.agent.len()
    }

    /// `(min, max)` timestamp over both buffers.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let earliest = [self.customer.earliest(), self.agent.earliest()]
            .into_iter()
            .flatten()
            .min()?;
        let latest = [self.customer.latest(), self.agent.latest()]
            .into_iter()
            .flatten()
            .max()?;
        Some((earliest, latest))
    }

    /// `max - min` timestamp over both buffers.
    pub fn span(&self) -> Option<TimeDelta> {
        self.bounds().map(|(min, max)| max - min)
    }

    /// Current phase for the given window size.
    pub fn phase(&self, window_size: TimeDelta) -> SessionPhase {
        match self.span() {
            None => SessionPhase::Empty,
            Some(span) if span >= window_size => SessionPhase::Ready,
            Some(_) => SessionPhase::Accumulating,
        }
    }

    /// Whether a threshold window is due.
    pub fn is_ready(&self, window_size: TimeDelta) -> bool {
        self.phase(window_size) == SessionPhase::Ready
    }

    /// Number of windows emitted so far for this session id, including
    /// those emitted before an eviction.
    pub fn windows_emitted(&self) -> u64 {
        self.windows_emitted
    }

    /// Reserves the sequence number of the next window.
    pub fn next_window_sequence(&mut self) -> u64 {
        let sequence = self.windows_emitted;
        self.windows_emitted += 1;
        sequence
    }

    /// Cutoff of the most recent threshold window.
    pub fn last_cutoff(&self) -> Option<DateTime<Utc>> {
        self.last_cutoff
    }

    /// Records the cutoff of a freshly closed window.
    pub fn record_cutoff(&mut self, cutoff: DateTime<Utc>) {
        self.last_cutoff = Some(self.last_cutoff.map_or(cutoff, |prev| prev.max(cutoff)));
    }

    /// Whether `timestamp` falls behind the last cutoff by more than `tolerance`.
    ///
    /// A tolerance reaching past the representable range accepts everything.
    pub fn is_late(&self, timestamp: DateTime<Utc>, tolerance: TimeDelta) -> bool {
        self.last_cutoff
            .and_then(|cutoff| cutoff.checked_sub_signed(tolerance))
            .is_some_and(|limit| timestamp < limit)
    }

    /// Processing-time instant of the last append.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// How long the session has been idle as of `now`.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}
