//! HTTP mapping for check-in errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use checkin::{CheckInError, PublicError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

/// Error returned by every handler.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authenticated and admin routes see the full error.
    #[error(transparent)]
    CheckIn(#[from] CheckInError),

    /// Anonymous intake only learns the generic outcome.
    #[error(transparent)]
    Public(#[from] PublicError),

    #[error("authentication required")]
    Unauthorized,

    #[error("admin access required")]
    Forbidden,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::CheckIn(err) => {
                let status = match err {
                    CheckInError::Token(_) | CheckInError::InvalidInput { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    CheckInError::NotLinkedToMember => StatusCode::FORBIDDEN,
                    CheckInError::RecordNotFound(_) | CheckInError::MemberNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    CheckInError::DuplicateCheckIn { .. }
                    | CheckInError::ConflictingAttendance { .. } => StatusCode::CONFLICT,
                    CheckInError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, err.code())
            }
            Self::Public(err) => match err {
                PublicError::InvalidToken => (StatusCode::BAD_REQUEST, "INVALID_TOKEN"),
                PublicError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                PublicError::Rejected => (StatusCode::CONFLICT, "REJECTED"),
                PublicError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE"),
            },
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            // Storage details stay in the logs.
            Self::CheckIn(err @ CheckInError::Storage(_)) => {
                error!(error = %err, "Storage failure");
                "service temporarily unavailable".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                error: message,
                code,
            }),
        )
            .into_response()
    }
}
