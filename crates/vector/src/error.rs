use thiserror::Error;

pub type VectorResult<T> = Result<T, VectorError>;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The snapshot was embedded by a different model than the one the
    /// engine would embed queries with.
    #[error("incompatible index: snapshot embedded with '{snapshot}', engine embeds with '{engine}'")]
    IncompatibleIndex { snapshot: String, engine: String },

    #[error("index blob encode failed: {0}")]
    Encode(String),

    #[error("index blob decode failed: {0}")]
    Decode(String),

    #[error("index blob declares {declared} vectors, caller expects {expected}")]
    CountMismatch { declared: usize, expected: usize },
}

impl From<bincode::error::EncodeError> for VectorError {
    fn from(err: bincode::error::EncodeError) -> Self {
        VectorError::Encode(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for VectorError {
    fn from(err: bincode::error::DecodeError) -> Self {
        VectorError::Decode(err.to_string())
    }
}
