use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use adminkit_auth::{AuthorizationExplanation, TokenError};
use adminkit_core::DomainError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything a handler can fail with, mapped onto one JSON error shape.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("invalid or expired token: {0}")]
    Token(#[from] TokenError),

    #[error("token has been revoked")]
    Revoked,

    #[error("{}", .0.reason)]
    Forbidden(Box<AuthorizationExplanation>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Token(err) => json_error(StatusCode::UNAUTHORIZED, "invalid_token", err.to_string()),
            ApiError::Revoked => json_error(StatusCode::UNAUTHORIZED, "token_revoked", "token has been revoked"),
            ApiError::Forbidden(explanation) => (
                StatusCode::FORBIDDEN,
                axum::Json(json!({
                    "error": "forbidden",
                    "message": explanation.reason,
                    "explanation": explanation,
                })),
            )
                .into_response(),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
            }
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::InvariantViolation(msg) => {
            tracing::error!(error = %msg, "invariant violated");
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::Unauthorized => {
            json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid username or password")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
