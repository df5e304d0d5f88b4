//! Unified error type.

use thiserror::Error;

/// A type-erased error, as produced by request bodies and stage logic.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shorthand for results carrying a weft [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// The error type returned by weft's fallible operations.
///
/// HTTP-level outcomes a stage decides on (401, 404, 422, ...) are written to
/// the response sink, not returned as `Error`s. This type surfaces setup
/// mistakes, failing stage logic, and listener infrastructure failures.
#[derive(Debug, Error)]
pub enum Error {
    /// The pipeline or server was configured incorrectly. Fatal to startup.
    #[error("configuration: {0}")]
    Configuration(String),

    /// A stage's logic failed while processing a request.
    #[error("stage `{stage}` failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    /// A stage invoked its continuation more than once for the same request.
    #[error("stage `{stage}` invoked its continuation more than once")]
    DoubleInvocation { stage: &'static str },

    /// The request was cancelled (connection dropped, timeout, shutdown).
    #[error("request cancelled")]
    Cancelled,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Wraps a failure raised inside the stage named `stage`.
    pub fn stage(stage: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Stage { stage, source: source.into() }
    }

    /// `true` for errors that abort a request because of a programming defect
    /// rather than a runtime condition.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::DoubleInvocation { .. })
    }
}
