use crate::error::ColloquyError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured analysis of one conversation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CognitiveAnalysis {
    /// Advice text addressed to the relationship manager.
    pub response_text: String,
    /// What the customer is trying to achieve.
    pub intent: String,
    /// Recommended strategy for the relationship manager.
    pub strategy: String,
    /// `low` / `medium` / `high`, as reported by the model.
    pub urgency: String,
    /// The customer's emotional state.
    pub emotion: String,
    /// What the relationship manager should do next.
    pub next_action: String,
}

/// Why no analysis is attached to a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FallbackReason {
    /// The analysis service did not answer within the dispatch timeout.
    Timeout,
    /// Connection failure or error status from the analysis service.
    Backend(String),
    /// The service answered but the answer was not a usable analysis.
    Malformed(String),
    /// The pipeline shut down before the analysis finished.
    Cancelled,
    /// No analysis service is configured.
    Disabled,
}

impl FallbackReason {
    /// Classifies an analysis error.
    pub fn from_error(err: &ColloquyError) -> Self {
        match err {
            ColloquyError::Timeout(_) => Self::Timeout,
            ColloquyError::Analysis(msg) => Self::Malformed(msg.clone()),
            ColloquyError::Json(e) => Self::Malformed(e.to_string()),
            other => Self::Backend(other.to_string()),
        }
    }

    /// Short label, used as a metrics key.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Backend(_) => "backend",
            Self::Malformed(_) => "malformed",
            Self::Cancelled => "cancelled",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("analysis timed out"),
            Self::Backend(msg) => write!(f, "analysis service failed: {msg}"),
            Self::Malformed(msg) => write!(f, "analysis response unusable: {msg}"),
            Self::Cancelled => f.write_str("analysis abandoned at shutdown"),
            Self::Disabled => f.write_str("analysis disabled"),
        }
    }
}

/// Outcome of dispatching a window to the analysis service.
///
/// A fallback is always tagged as such and can never be mistaken for a
/// real analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// The service produced a structured analysis.
    Analyzed(CognitiveAnalysis),
    /// The analysis is unavailable; the window is still delivered.
    Unavailable {
        /// Why.
        reason: FallbackReason,
    },
}

impl AnalysisResult {
    /// Builds a fallback result.
    pub fn unavailable(reason: FallbackReason) -> Self {
        Self::Unavailable { reason }
    }

    /// `true` when this is a substituted fallback.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// The analysis, if one was produced.
    pub fn analysis(&self) -> Option<&CognitiveAnalysis> {
        match self {
            Self::Analyzed(a) => Some(a),
            Self::Unavailable { .. } => None,
        }
    }

    /// The fallback reason, if this is a fallback.
    pub fn fallback_reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Analyzed(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}
