use thiserror::Error;

/// A convenience `Result` alias using [`LodestarError`].
pub type LodestarResult<T> = Result<T, LodestarError>;

/// Top-level error type for Lodestar.
///
/// Most external failures never reach callers as this type: the retrieval
/// engine degrades to the remaining signal sources, and the reasoning loop
/// folds tool and oracle failures into observations. What does surface here
/// is either a configuration problem or a failure with nothing left to fall
/// back on.
#[derive(Error, Debug)]
pub enum LodestarError {
    /// An error originating from the reasoning loop.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Every signal source of a retrieval call failed.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// A single signal source (vector, keyword, graph) could not answer.
    #[error("Signal source '{source_name}' unavailable: {reason}")]
    SignalUnavailable {
        /// Name of the failing source.
        source_name: String,
        /// Human-readable cause.
        reason: String,
    },

    /// The reasoning or reflection oracle failed to produce a completion.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// An error raised by a tool during invocation.
    #[error("Skill error: {0}")]
    Skill(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An external call exceeded its deadline.
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LodestarError {
    /// Shorthand for [`LodestarError::SignalUnavailable`].
    pub fn signal_unavailable(source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SignalUnavailable {
            source_name: source.into(),
            reason: reason.into(),
        }
    }
}
