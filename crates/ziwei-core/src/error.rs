//! Error type shared by the pure core operations.

/// Result alias for `ziwei-core`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced to the immediate caller of a core operation.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed caller arguments, e.g. an empty palace sequence.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stem symbol outside the ten canonical heavenly stems.
    #[error("unknown stem: {0:?}")]
    UnknownStem(String),

    /// The document index JSON could not be parsed.
    #[error("malformed document index: {0}")]
    IndexFormat(#[from] serde_json::Error),
}
