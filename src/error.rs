// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

use crate::atom::AtomError;

/// HTTP API error with appropriate status codes and client-friendly reasons.
///
/// Every variant renders as the uniform failure envelope
/// `{"success": false, "reason": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Validation(String),

    // 401 Unauthorized
    #[error("{0}")]
    Unauthorized(String),

    // 403 Forbidden
    #[error("{0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("{0}")]
    NotFound(String),

    // 405 Method Not Allowed
    #[error("{0}")]
    MethodNotAllowed(String),

    // 409 Conflict (uniqueness violation)
    #[error("{0}")]
    Conflict(String),

    // 500 Internal Server Error
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe failure reason.
    pub fn reason(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Validation(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    /// The uniform failure envelope.
    pub fn envelope(&self) -> Value {
        json!({
            "success": false,
            "reason": self.reason(),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        ApiError::MethodNotAllowed(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<AtomError> for ApiError {
    fn from(err: AtomError) -> Self {
        match err {
            AtomError::Validation(msg) => ApiError::Validation(msg),
            AtomError::Forbidden(msg) => ApiError::Forbidden(msg),
            AtomError::NotFound(msg) => ApiError::NotFound(msg),
            AtomError::Conflict(msg) => ApiError::Conflict(msg),
            AtomError::IllegalState(msg) => ApiError::BadRequest(msg.to_string()),
            AtomError::Storage(err) => {
                // Don't expose internal SQL errors to clients
                tracing::error!("storage error: {}", err);
                ApiError::Internal("An error occurred while processing your request.".to_string())
            }
        }
    }
}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(ApiError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(ApiError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn envelope_carries_reason() {
        let err = ApiError::not_found("Endpoint not found.");
        let body = err.envelope();
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "Endpoint not found.");
    }

    #[test]
    fn atom_errors_translate() {
        let err: ApiError = AtomError::Conflict("taken".into()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let err: ApiError = AtomError::IllegalState("no active edit").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
