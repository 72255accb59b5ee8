//! Error types for the coordination core

use thiserror::Error;

use crate::directory::DirectoryError;
use crate::engine::EngineError;
use crate::types::RoomId;

/// Request-scoped coordination error.
///
/// Every variant is reported to the originating connection only.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Media engine failure: {0}")]
    UpstreamFailure(#[from] EngineError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Room {room_id} is full ({limit} peers)")]
    RoomFull { room_id: RoomId, limit: usize },

    #[error("Maximum number of rooms reached ({0})")]
    RoomLimitReached(usize),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code sent on the wire
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::UpstreamFailure(_) => "UPSTREAM_FAILURE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::RoomFull { .. } => "ROOM_FULL",
            Self::RoomLimitReached(_) => "ROOM_LIMIT",
            Self::Directory(_) => "INTERNAL",
        }
    }
}

/// Result type for coordination operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::not_found("transport", "t1").code(), "NOT_FOUND");
        assert_eq!(
            Error::InvalidOperation("cannot consume own producer".into()).code(),
            "INVALID_OPERATION"
        );
        assert_eq!(Error::from(EngineError::new("boom")).code(), "UPSTREAM_FAILURE");
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("consumer", "c-42");
        assert_eq!(err.to_string(), "consumer not found: c-42");
    }
}
