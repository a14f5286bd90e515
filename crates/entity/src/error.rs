use thiserror::Error;

pub type EntityResult<T> = Result<T, EntityError>;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("directory '{0}' does not exist")]
    MissingDirectory(String),
}
