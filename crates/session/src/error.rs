use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid session id '{0}'")]
    InvalidId(String),

    #[error("corrupt session log for '{session_id}' at line {line}: {cause}")]
    CorruptLog {
        session_id: String,
        line: usize,
        cause: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<tempfile::PersistError> for SessionError {
    fn from(err: tempfile::PersistError) -> Self {
        SessionError::Io(err.error)
    }
}
