//! HTTP error mapping.
//!
//! Every failure leaves the API as `{"error": <kind>, "message": <text>}`.
//! Authentication failures carry generic messages only.

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use comanda_core::DomainError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, "BadRequest", msg)
            }
            ApiError::Unauthorized(msg) => {
                tracing::warn!("Unauthorized: {}", msg);
                (StatusCode::UNAUTHORIZED, "Unauthorized", msg)
            }
            ApiError::Forbidden(msg) => {
                tracing::warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, "Forbidden", msg)
            }
            ApiError::NotFound(msg) => {
                tracing::warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, "NotFound", msg)
            }
            ApiError::Conflict(msg) => {
                tracing::warn!("Conflict: {}", msg);
                (StatusCode::CONFLICT, "Conflict", msg)
            }
            ApiError::TooManyRequests(msg) => {
                tracing::warn!("Throttled: {}", msg);
                (StatusCode::TOO_MANY_REQUESTS, "TooManyRequests", msg)
            }
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError", msg)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError(msg) => ApiError::BadRequest(msg),
            DomainError::EmptyPatch
            | DomainError::PasswordTooShort
            | DomainError::PasswordTooLong => ApiError::BadRequest(err.to_string()),

            DomainError::InvalidCredentials => ApiError::Unauthorized("Invalid credentials".to_string()),
            DomainError::InvalidToken(_) | DomainError::TokenExpired => {
                ApiError::Unauthorized("Invalid or expired token".to_string())
            }

            DomainError::RestaurantNotActive => {
                ApiError::Forbidden("Restaurant subscription is not active".to_string())
            }

            DomainError::RestaurantNotFound => ApiError::NotFound("Restaurant not found".to_string()),

            DomainError::EmailAlreadyExists(_)
            | DomainError::Conflict(_)
            | DomainError::InvalidTransition { .. }
            | DomainError::PortRangeExhausted { .. } => ApiError::Conflict(err.to_string()),

            DomainError::DatabaseError(msg) => ApiError::DatabaseError(msg),

            DomainError::SpawnError(_)
            | DomainError::PasswordHashError(_)
            | DomainError::TokenGenerationError(_)
            | DomainError::InternalError(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_status_mapping() {
        let cases = [
            (DomainError::EmptyPatch, StatusCode::BAD_REQUEST),
            (DomainError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (DomainError::TokenExpired, StatusCode::UNAUTHORIZED),
            (DomainError::RestaurantNotActive, StatusCode::FORBIDDEN),
            (DomainError::RestaurantNotFound, StatusCode::NOT_FOUND),
            (DomainError::EmailAlreadyExists("a@b.c".into()), StatusCode::CONFLICT),
            (
                DomainError::InvalidTransition {
                    action: "restart",
                    state: "inactive".into(),
                },
                StatusCode::CONFLICT,
            ),
            (DomainError::SpawnError("enoent".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::DatabaseError("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_token_errors_share_message() {
        let expired = ApiError::from(DomainError::TokenExpired).to_string();
        let invalid = ApiError::from(DomainError::InvalidToken("bad signature".into())).to_string();
        assert_eq!(expired, invalid);
    }
}
