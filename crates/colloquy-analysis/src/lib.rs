//! Analysis service clients for Colloquy.
//!
//! A closed conversation window is rendered into a prompt, sent to a
//! language model and the answer parsed into a
//! [`CognitiveAnalysis`](colloquy_core::CognitiveAnalysis). Providers sit
//! behind the [`AnalysisBackend`] trait; [`AnalysisClient`] ties a backend
//! to prompt building and response parsing and is what the dispatcher calls
//! through [`AnalysisService`].

/// Provider backends.
pub mod backends;
/// High-level client and the service trait.
pub mod client;
/// Model and `[analysis]` configuration.
pub mod config;
/// Retry and failover across backends.
pub mod failover;
/// Response parsing.
pub mod parse;
/// Prompt rendering.
pub mod prompt;

pub use backends::AnalysisBackend;
pub use client::{AnalysisClient, AnalysisService};
pub use config::{AnalysisProvider, AnalysisSettings, ModelConfig};
pub use failover::{FailoverBackend, RetryPolicy};
pub use parse::parse_analysis;
pub use prompt::{build_prompt, SYSTEM_PROMPT};
