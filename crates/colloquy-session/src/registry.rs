use crate::state::SessionState;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Handle to one session's state. Clones share the same instance.
pub type SharedSession = Arc<Mutex<SessionState>>;

/// Maps session ids to their state, creating state on first contact.
///
/// `get_or_create` is the only cross-task synchronization point: once a
/// handle is obtained, mutation goes through that session's own mutex.
/// Entries are only removed through [`SessionRegistry::remove`]; a removed
/// id that shows up again resumes its window numbering, so
/// `(session_id, sequence)` stays unique.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
    next_window: Mutex<HashMap<String, u64>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for `session_id`, creating it if absent.
    ///
    /// Repeated calls with the same id return the same instance.
    pub fn get_or_create(&self, session_id: &str) -> SharedSession {
        if let Some(existing) = self.sessions.read().get(session_id) {
            return Arc::clone(existing);
        }
        let mut sessions = self.sessions.write();
        let entry = sessions.entry(session_id.to_string()).or_insert_with(|| {
            let next_window = self.next_window.lock().remove(session_id).unwrap_or(0);
            debug!(session_id = %session_id, next_window, "Creating session state");
            Arc::new(Mutex::new(SessionState::resume(session_id, next_window)))
        });
        Arc::clone(entry)
    }

    /// Returns the state for `session_id` without creating it.
    pub fn get(&self, session_id: &str) -> Option<SharedSession> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Whether `session_id` is known.
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Snapshot of the known ids, sorted so sweeps visit sessions in a
    /// stable order.
    pub fn all_session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Removes a session. Outstanding handles stay valid but are detached.
    ///
    /// Only the next window sequence is remembered for the id.
    pub fn remove(&self, session_id: &str) -> Option<SharedSession> {
        let removed = self.sessions.write().remove(session_id)?;
        let next_window = removed.lock().windows_emitted();
        self.next_window
            .lock()
            .insert(session_id.to_string(), next_window);
        Some(removed)
    }

    /// Number of known sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// `true` when no session is known.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Total buffered events across all sessions.
    pub fn buffered_events(&self) -> usize {
        self.sessions
            .read()
            .values()
            .map(|s| s.lock().buffered_len())
            .sum()
    }
}
