use peerscope_core::{CoreError, ErrorKind, ExternalError};
use peerscope_db::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    External(#[from] ExternalError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// The failure kind for external-call errors; `None` for storage and
    /// lookup failures.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            EngineError::External(e) => Some(e.kind()),
            EngineError::Core(_) => Some(ErrorKind::Validation),
            EngineError::Db(_) | EngineError::UserNotFound(_) => None,
        }
    }
}
