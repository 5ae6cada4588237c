use thiserror::Error;

/// A convenience `Result` alias using [`ColloquyError`].
pub type ColloquyResult<T> = Result<T, ColloquyError>;

/// Top-level error type for the Colloquy framework.
///
/// Each variant corresponds to a subsystem that can produce errors. None of
/// them is fatal to a running pipeline: rejected events are logged and
/// skipped, analysis failures are replaced by a fallback result.
#[derive(Error, Debug)]
pub enum ColloquyError {
    /// An input record with a missing or unparsable field.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// An event older than the session's lateness bound.
    #[error("Late event: {0}")]
    LateEvent(String),

    /// An error related to session state lookup.
    #[error("Session error: {0}")]
    Session(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// The analysis service answered with something that could not be used.
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An operation exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An error raised while delivering a report to a sink.
    #[error("Sink error: {0}")]
    Sink(String),

    /// An error from the pipeline runtime (closed channels, crashed workers).
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
