use crate::config::EngineConfig;
use crate::merger::{merge_and_drain, DrainBoundary};
use crate::stats::EngineStats;
use colloquy_core::{ColloquyError, ColloquyResult, Event, RawRecord, Window, WindowTrigger};
use colloquy_session::{SessionPhase, SessionRegistry, SessionState};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of an idle sweep.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Windows flushed out of the evicted sessions.
    pub windows: Vec<Window>,
    /// Ids of the evicted sessions.
    pub evicted: Vec<String>,
}

/// Drives ingestion and the per-session merge/emit/drain cycle.
///
/// Readiness is re-evaluated on every ingested event, so emission is purely
/// event-driven: a fixed input sequence and window size always produce the
/// same windows.
pub struct WindowingEngine {
    config: EngineConfig,
    registry: Arc<SessionRegistry>,
    stats: EngineStats,
}

impl WindowingEngine {
    /// Creates an engine with a fresh registry.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, Arc::new(SessionRegistry::new()))
    }

    /// Creates an engine on top of an existing registry.
    pub fn with_registry(config: EngineConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config,
            registry,
            stats: EngineStats::default(),
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Counters so far.
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Validates a raw record and ingests it.
    ///
    /// Malformed records are counted, logged and returned as
    /// [`ColloquyError::MalformedEvent`]; they never reach a buffer.
    pub fn ingest_raw(&mut self, raw: RawRecord) -> ColloquyResult<Vec<Window>> {
        match Event::try_from(raw) {
            Ok(event) => self.ingest(event),
            Err(e) => {
                self.stats.events_rejected += 1;
                warn!(error = %e, "Rejected malformed event");
                Err(e)
            }
        }
    }

    /// Buffers an event and emits every window that became due.
    ///
    /// Usually returns zero or one window; the drain-then-recheck loop runs
    /// until the session is no longer ready.
    pub fn ingest(&mut self, event: Event) -> ColloquyResult<Vec<Window>> {
        if !self.registry.contains(event.session_id()) {
            self.stats.sessions_created += 1;
        }
        let shared = self.registry.get_or_create(event.session_id());
        let mut state = shared.lock();

        if let Some(tolerance) = self.config.allowed_lateness() {
            if state.is_late(event.timestamp(), tolerance) {
                self.stats.events_late += 1;
                let err = ColloquyError::LateEvent(format!(
                    "session {} event at {} is behind cutoff {:?} by more than {}",
                    event.session_id(),
                    event.timestamp(),
                    state.last_cutoff(),
                    tolerance
                ));
                warn!(session_id = %event.session_id(), error = %err, "Rejected late event");
                return Err(err);
            }
        }

        debug!(
            session_id = %event.session_id(),
            speaker = %event.speaker(),
            timestamp = %event.timestamp(),
            "Buffered event"
        );
        state.append(event);
        self.stats.events_accepted += 1;

        Ok(self.drain_ready(&mut state))
    }

    fn drain_ready(&mut self, state: &mut SessionState) -> Vec<Window> {
        let mut windows = Vec::new();
        while state.is_ready(self.config.window_size()) {
            let Some((_, cutoff)) = state.bounds() else {
                break;
            };
            let Some(window) =
                merge_and_drain(state, DrainBoundary::Before(cutoff), WindowTrigger::Threshold)
            else {
                break;
            };
            self.stats.windows_emitted += 1;
            log_window(&window, state.buffered_len());
            windows.push(window);
        }
        windows
    }

    /// Whether `session_id` currently has a window due.
    pub fn check_ready(&self, session_id: &str) -> bool {
        self.session_phase(session_id) == Some(SessionPhase::Ready)
    }

    /// Phase of `session_id`, or `None` for an unknown session.
    pub fn session_phase(&self, session_id: &str) -> Option<SessionPhase> {
        let shared = self.registry.get(session_id)?;
        let phase = shared.lock().phase(self.config.window_size());
        Some(phase)
    }

    /// Emits whatever `session_id` has buffered, regardless of span.
    ///
    /// The session stays registered and starts accumulating again on its
    /// next event. Returns `None` when nothing is buffered.
    pub fn flush(&mut self, session_id: &str) -> Option<Window> {
        self.flush_with(session_id, WindowTrigger::Flush)
    }

    /// Flushes every known session, in session-id order.
    pub fn flush_all(&mut self) -> Vec<Window> {
        self.registry
            .all_session_ids()
            .iter()
            .filter_map(|id| self.flush(id))
            .collect()
    }

    /// Flushes and evicts every session idle for at least the configured
    /// idle timeout. A no-op when no idle timeout is configured.
    pub fn sweep_idle(&mut self, now: Instant) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let Some(timeout) = self.config.idle_timeout() else {
            return outcome;
        };

        for id in self.registry.all_session_ids() {
            let Some(shared) = self.registry.get(&id) else {
                continue;
            };
            let idle_for = shared.lock().idle_for(now);
            if idle_for < timeout {
                continue;
            }
            if let Some(window) = self.flush_with(&id, WindowTrigger::IdleTimeout) {
                outcome.windows.push(window);
            }
            self.registry.remove(&id);
            self.stats.sessions_evicted += 1;
            info!(session_id = %id, idle_secs = idle_for.as_secs_f64(), "Evicted idle session");
            outcome.evicted.push(id);
        }
        outcome
    }

    fn flush_with(&mut self, session_id: &str, trigger: WindowTrigger) -> Option<Window> {
        let shared = self.registry.get(session_id)?;
        let mut state = shared.lock();
        let window = merge_and_drain(&mut state, DrainBoundary::All, trigger)?;
        self.stats.windows_flushed += 1;
        log_window(&window, state.buffered_len());
        Some(window)
    }
}

fn log_window(window: &Window, residual: usize) {
    info!(
        session_id = %window.session_id(),
        sequence = window.sequence(),
        trigger = ?window.trigger(),
        messages = window.len(),
        window_start = %window.window_start().format("%H:%M:%S%.3f"),
        window_end = %window.window_end().format("%H:%M:%S%.3f"),
        residual,
        "Window emitted"
    );
}
