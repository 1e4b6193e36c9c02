use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::engine::EngineError;

/// Every failure the HTTP layer reports. Rendered as `{ "error", "code" }`.
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    Auth(AuthError),
    NotFound(String),
    Conflict(String),
    Limit(String),
    Internal(String),
    Unavailable,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(AuthError::AccountInactive) => StatusCode::FORBIDDEN,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Limit(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Auth(e) => e.code(),
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::Limit(_) => "LIMIT_EXCEEDED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Unavailable => "UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Validation(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Limit(msg)
            | ApiError::Internal(msg) => write!(f, "{msg}"),
            ApiError::Auth(e) => write!(f, "{e}"),
            ApiError::Unavailable => write!(f, "Server busy, try again later"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(_) => ApiError::NotFound(e.to_string()),
            EngineError::AlreadyExists(_) | EngineError::SlotOccupied { .. } => {
                ApiError::Conflict(e.to_string())
            }
            EngineError::Invalid(msg) => ApiError::Validation(msg.to_string()),
            EngineError::LimitExceeded(_) => ApiError::Limit(e.to_string()),
            EngineError::WalError(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::Auth(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(msg) => error!("request failed: {msg}"),
            ApiError::Unavailable => {}
            other => warn!(status = status.as_u16(), "request rejected: {other}"),
        }
        let body = Json(json!({ "error": self.to_string(), "code": self.code() }));
        (status, body).into_response()
    }
}
