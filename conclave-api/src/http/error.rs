// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Map coordination errors onto HTTP statuses
impl From<conclave_sfu::Error> for AppError {
    fn from(err: conclave_sfu::Error) -> Self {
        use conclave_sfu::Error;

        match &err {
            Error::NotFound { .. } => Self::not_found(err.to_string()),
            Error::InvalidRequest(_) | Error::InvalidOperation(_) => {
                Self::bad_request(err.to_string())
            }
            Error::RoomFull { .. } | Error::RoomLimitReached(_) => {
                Self::new(StatusCode::CONFLICT, err.to_string())
            }
            Error::UpstreamFailure(_) => {
                tracing::error!("Media engine error: {}", err);
                Self::new(StatusCode::BAD_GATEWAY, "Media engine unavailable")
            }
            Error::Directory(_) => {
                tracing::error!("Directory error: {}", err);
                Self::internal_server_error("Internal server error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_sfu::{EngineError, Error};

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(Error::not_found("room", "r1")).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(Error::InvalidRequest("empty room id".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(Error::RoomLimitReached(4)).status,
            StatusCode::CONFLICT
        );

        let upstream = AppError::from(Error::from(EngineError::new("worker died")));
        assert_eq!(upstream.status, StatusCode::BAD_GATEWAY);
        assert!(!upstream.message.contains("worker died"));
    }
}
