//! Session-keyed tumbling-window engine.
//!
//! Partitions a stream of dialogue turns by session id, buffers each
//! speaker's turns separately, and closes a window whenever the buffered
//! span of a session reaches the configured window size. Closing a window
//! merges both speaker buffers into one chronologically ordered [`Window`]
//! and leaves the events at the closing instant buffered for the next one.
//!
//! # Main types
//!
//! - [`WindowingEngine`] — Drives ingestion, readiness checks, flushes and idle sweeps.
//! - [`EngineConfig`] — Window size, lateness tolerance and idle timeout.
//! - [`EngineSettings`] — Serde-friendly form of [`EngineConfig`] for config files.
//! - [`EngineStats`] — Counters for accepted, rejected and emitted items.
//! - [`merge_and_drain`] — Window merge with the documented tie-break order.
//!
//! [`Window`]: colloquy_core::Window

/// Engine configuration.
pub mod config;
/// The windowing engine.
pub mod engine;
/// Buffer merge into windows.
pub mod merger;
/// Engine counters.
pub mod stats;

pub use config::{EngineConfig, EngineSettings};
pub use engine::{SweepOutcome, WindowingEngine};
pub use merger::{merge_and_drain, sort_for_window, DrainBoundary};
pub use stats::EngineStats;
