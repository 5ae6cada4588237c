//! Report sinks for Colloquy.
//!
//! Every closed window is delivered exactly once as a [`WindowReport`],
//! with either its analysis or the reason the analysis is missing.
//!
//! # Main types
//!
//! - [`Sink`] — Trait for report consumers.
//! - [`SinkManager`] — Fans a report out to every registered sink.
//! - [`ConsoleSink`], [`JsonlSink`], [`ChannelSink`] — Built-in sinks.

/// In-process channel sink.
pub mod channel;
/// Human-readable console sink.
pub mod console;
/// JSON-lines file sink.
pub mod jsonl;
/// Sink fan-out.
pub mod manager;
/// Core sink trait and report type.
pub mod sink;

pub use channel::ChannelSink;
pub use console::{render_report, ConsoleSink};
pub use jsonl::JsonlSink;
pub use manager::SinkManager;
pub use sink::{Sink, WindowReport};
