//! Core types and error definitions for the Colloquy framework.
//!
//! This crate provides the foundational types shared across all Colloquy crates:
//! the dialogue-turn event model, the emitted window value, the analysis result
//! exchanged with the analysis service, and the unified error enum.
//!
//! # Main types
//!
//! - [`ColloquyError`] — Unified error enum for all Colloquy subsystems.
//! - [`ColloquyResult`] — Convenience alias for `Result<T, ColloquyError>`.
//! - [`Speaker`] — The two conversation roles (customer, agent).
//! - [`Event`] — One immutable, timestamped dialogue turn.
//! - [`RawRecord`] — An unvalidated input record as read from a source.
//! - [`Window`] — A chronologically ordered batch of events for one session.
//! - [`AnalysisResult`] — Structured analysis of a window, or an explicit fallback.

/// Analysis result types returned by the analysis service.
pub mod analysis;
/// Unified error type.
pub mod error;
/// Dialogue-turn events and raw input records.
pub mod event;
/// Emitted window value objects.
pub mod window;

pub use analysis::{AnalysisResult, CognitiveAnalysis, FallbackReason};
pub use error::{ColloquyError, ColloquyResult};
pub use event::{parse_timestamp, Event, RawRecord, Speaker};
pub use window::{Window, WindowMessage, WindowPayload, WindowTrigger};
