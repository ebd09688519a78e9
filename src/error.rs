use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// ApiError
///
/// The application-wide error type. Every fallible handler and repository
/// method funnels into this enum, which maps the domain failure taxonomy onto
/// HTTP status codes:
///
/// - `NotFound`     -> 404 (referenced car/rental/user absent)
/// - `Conflict`     -> 409 (car unavailable, duplicate username/email, lost CAS)
/// - `InvalidInput` -> 400 (bad dates, unknown or illegal status transition)
/// - `Unauthorized` -> 401 (missing/expired token, bad credentials)
/// - `Forbidden`    -> 403 (authenticated but lacks the required role)
/// - `Database`     -> 500 (persistence failure; detail is logged, never leaked)
///
/// Validation-level failures are surfaced verbatim to the caller; there is no
/// retry logic because none of them are transient.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid credentials")]
    Unauthorized,

    #[error("insufficient permissions")]
    Forbidden,

    /// SQLx driver error. Surfaced as a generic server-side failure.
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// Anything else that should read as a 500 (storage backend, hashing).
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, self.to_string()),
            ApiError::Database(e) => {
                tracing::error!("database error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
