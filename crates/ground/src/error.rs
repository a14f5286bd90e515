use thiserror::Error;

pub type GroundResult<T> = Result<T, GroundError>;

#[derive(Debug, Error)]
pub enum GroundError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rebuild cancelled")]
    Cancelled,
}
