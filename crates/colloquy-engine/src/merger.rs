use chrono::{DateTime, Utc};
use colloquy_core::{Speaker, Window, WindowTrigger};
use colloquy_session::{BufferedEvent, SessionState};

/// Which buffered events a merge takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainBoundary {
    /// Events strictly earlier than the cutoff. Used when a window closes on
    /// the span threshold: the events at the cutoff open the next window.
    Before(DateTime<Utc>),
    /// Events at or before the cutoff.
    UpTo(DateTime<Utc>),
    /// Everything buffered (flush).
    All,
}

impl DrainBoundary {
    fn cutoff(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Before(c) | Self::UpTo(c) => Some(*c),
            Self::All => None,
        }
    }
}

/// Sorts drained events into window order.
///
/// Ascending timestamp; ties go customer before agent, then by arrival
/// sequence. Any prompt built from a window depends on this order.
pub fn sort_for_window(events: &mut [BufferedEvent]) {
    events.sort_by(|a, b| {
        a.event
            .timestamp()
            .cmp(&b.event.timestamp())
            .then_with(|| a.event.speaker().cmp(&b.event.speaker()))
            .then_with(|| a.seq.cmp(&b.seq))
    });
}

/// Drains both speaker buffers of `state` up to `boundary` and merges the
/// drained events into one window.
///
/// Returns `None` when nothing was drained; the buffers are then untouched.
/// Draining is the only side effect besides reserving the window's sequence
/// number and recording the session's cutoff.
pub fn merge_and_drain(
    state: &mut SessionState,
    boundary: DrainBoundary,
    trigger: WindowTrigger,
) -> Option<Window> {
    let mut drained: Vec<BufferedEvent> = Vec::with_capacity(state.buffered_len());
    for speaker in Speaker::ALL {
        let buffer = state.buffer_mut(speaker);
        drained.extend(match boundary {
            DrainBoundary::Before(cutoff) => buffer.drain_before(cutoff),
            DrainBoundary::UpTo(cutoff) => buffer.drain_up_to(cutoff),
            DrainBoundary::All => buffer.drain_all(),
        });
    }
    if drained.is_empty() {
        return None;
    }

    sort_for_window(&mut drained);
    let messages: Vec<_> = drained.into_iter().map(|e| e.event).collect();

    let closed_at = boundary.cutoff();
    let sequence = state.next_window_sequence();
    let window = Window::new(
        state.session_id().to_string(),
        sequence,
        closed_at,
        trigger,
        messages,
    )?;
    state.record_cutoff(closed_at.unwrap_or_else(|| window.window_end()));
    Some(window)
}
