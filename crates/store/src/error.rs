use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the snapshot container.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structural inconsistency in an existing container file. Anything from
    /// a bad magic to a region pointing past the end of the file lands here.
    #[error("corrupt container: {0}")]
    CorruptContainer(String),

    /// The container was built for a different vector dimension than the one
    /// the engine is configured with.
    #[error("vector dimension mismatch: container has {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    /// A vector row handed to `write_snapshot` was not unit-norm.
    #[error("vector row {row} is not unit-norm (|v| = {norm})")]
    NotNormalized { row: usize, norm: f32 },

    #[error("vector blob shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("chunk directory encode failed: {0}")]
    Encode(String),

    #[error("chunk directory decode failed: {0}")]
    Decode(String),

    #[error("metadata parse failed: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl From<bincode::error::EncodeError> for StoreError {
    fn from(err: bincode::error::EncodeError) -> Self {
        StoreError::Encode(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for StoreError {
    fn from(err: bincode::error::DecodeError) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<tempfile::PersistError> for StoreError {
    fn from(err: tempfile::PersistError) -> Self {
        StoreError::Io(err.error)
    }
}
