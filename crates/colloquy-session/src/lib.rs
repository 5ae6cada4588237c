//! Per-session state for the Colloquy windowing engine.
//!
//! Every conversation session owns two [`SpeakerBuffer`]s, one per speaker
//! role, bundled in a [`SessionState`]. The [`SessionRegistry`] maps session
//! ids to their state and lazily creates it on first contact.

/// Per-speaker ordered event store.
pub mod buffer;
/// Session id to session state mapping.
pub mod registry;
/// Per-session state and readiness.
pub mod state;

pub use buffer::{BufferedEvent, SpeakerBuffer};
pub use registry::{SessionRegistry, SharedSession};
pub use state::{SessionPhase, SessionState};
