use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Event has already started")]
    EventStarted,

    #[error("Insufficient locked seats for booking. Found {found} locked seats, need {need}. Please select seats first")]
    InsufficientHeld { need: i32, found: i32 },

    #[error("Booking has expired")]
    Expired,

    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(String),
}

/// SQLSTATE codes that signal a lost race rather than a real failure:
/// serialization_failure, deadlock_detected, lock_not_available.
fn transient_sqlstate(code: &str) -> bool {
    matches!(code, "40001" | "40P01" | "55P03")
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::EventStarted => StatusCode::BAD_REQUEST,
            AppError::InsufficientHeld { .. } => StatusCode::BAD_REQUEST,
            AppError::Expired => StatusCode::BAD_REQUEST,
            AppError::Inconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::EventStarted => "EVENT_STARTED",
            AppError::InsufficientHeld { .. } => "INSUFFICIENT_HELD_SEATS",
            AppError::Expired => "BOOKING_EXPIRED",
            AppError::Inconsistent(_) => "INCONSISTENT_STATE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Whether the transactional gateway may retry the failed operation.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .map(|code| transient_sqlstate(&code))
                .unwrap_or(false),
            AppError::Database(sqlx::Error::Io(_)) => true,
            AppError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }

    fn log(&self) {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Inconsistent(msg)
            | AppError::Internal(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::EventStarted | AppError::Expired | AppError::InsufficientHeld { .. } => {
                error!(error = ?self, "Application error");
            }
            AppError::Database(e) => {
                error!(error = ?e, "Database error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        // Do not expose internal details in the API response
        let details = None;

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("gone".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("taken".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::EventStarted.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InsufficientHeld { need: 3, found: 0 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Expired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Inconsistent("count mismatch".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_insufficient_held_message_names_counts() {
        let err = AppError::InsufficientHeld { need: 3, found: 0 };
        let message = err.to_string();
        assert!(message.contains("Found 0 locked seats, need 3"));
    }

    #[test]
    fn test_transient_sqlstates() {
        assert!(transient_sqlstate("40001"));
        assert!(transient_sqlstate("40P01"));
        assert!(transient_sqlstate("55P03"));
        assert!(!transient_sqlstate("23505"));
        assert!(!transient_sqlstate("42601"));
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!AppError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!AppError::Conflict("seat taken".into()).is_transient());
        assert!(!AppError::EventStarted.is_transient());
    }
}
