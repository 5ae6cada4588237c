//! Runtime for Colloquy: replays or receives conversation events, runs
//! them through the windowing engine and dispatches every closed window
//! for analysis and delivery.
//!
//! # Main types
//!
//! - [`Pipeline`] — The single ingest loop that owns the engine.
//! - [`PipelineHandle`] — Push-style input into a running pipeline.
//! - [`JsonlSource`] — Replays a JSON-lines conversation file.
//! - [`Dispatcher`] — Per-session analysis workers with timeout, fallback
//!   and shutdown grace.
//! - [`DispatchMonitor`] — Dispatch counters.

/// Analysis dispatch.
pub mod dispatch;
/// Dispatch counters.
pub mod monitor;
/// The ingest loop.
pub mod pipeline;
/// Event sources and the pipeline handle.
pub mod source;

pub use dispatch::{DispatchConfig, Dispatcher};
pub use monitor::{DispatchMonitor, DispatchStats};
pub use pipeline::{Pipeline, PipelineConfig, PipelineSummary};
pub use source::{JsonlSource, PipelineHandle, ReplayStats, SourceSettings};
