//! HTTP Error Handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    pub error: String,
    pub data: Option<()>,
}

impl ErrorResponse {
    pub fn new(errno: i32, error: impl Into<String>) -> Self {
        Self {
            errno,
            error: error.into(),
            data: None,
        }
    }
}

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const GONE: i32 = 410;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const FETCH_FAILED: i32 = 502;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Gone(String),
    FetchFailed { reason: String, kind: &'static str },
    Internal(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn errno(&self) -> i32 {
        match self {
            ApiError::NotFound(_) => errno::NOT_FOUND,
            ApiError::BadRequest(_) => errno::BAD_REQUEST,
            ApiError::Gone(_) => errno::GONE,
            ApiError::FetchFailed { .. } => errno::FETCH_FAILED,
            ApiError::Internal(_) => errno::INTERNAL_ERROR,
            ApiError::ServiceUnavailable(_) => errno::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let errno = self.errno();
        let message = match self {
            ApiError::NotFound(msg) => {
                tracing::warn!(errno, error = %msg, "Resource not found");
                msg
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(errno, error = %msg, "Bad request");
                msg
            }
            ApiError::Gone(msg) => {
                tracing::info!(errno, error = %msg, "Resource gone");
                msg
            }
            ApiError::FetchFailed { reason, kind } => {
                tracing::warn!(errno, kind, "Fetch failed");
                reason
            }
            ApiError::Internal(msg) => {
                tracing::error!(errno, error = %msg, "Internal server error");
                msg
            }
            ApiError::ServiceUnavailable(msg) => {
                tracing::error!(errno, error = %msg, "Service unavailable");
                msg
            }
        };

        (StatusCode::OK, Json(ErrorResponse::new(errno, message))).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(e: ApplicationError) -> Self {
        let message = e.user_message();
        match e {
            ApplicationError::ValidationError(msg) => ApiError::BadRequest(msg),
            ApplicationError::FetchFailed { kind } => ApiError::FetchFailed {
                reason: message,
                kind,
            },
            ApplicationError::HandleNotFound(_) => ApiError::NotFound(message),
            ApplicationError::HandleExpired(_) => ApiError::Gone(message),
            ApplicationError::InvalidState(msg) => ApiError::BadRequest(msg),
            ApplicationError::RepositoryError(msg) => ApiError::Internal(msg),
            ApplicationError::ExternalServiceError(msg) => ApiError::ServiceUnavailable(msg),
            ApplicationError::StorageError(msg) => ApiError::Internal(msg),
            ApplicationError::Cancelled => ApiError::ServiceUnavailable(message),
            ApplicationError::InternalError(msg) => ApiError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::error::{FETCH_FAILED_MESSAGE, HANDLE_EXPIRED_MESSAGE};

    #[test]
    fn test_handle_errors_map_to_distinct_errno() {
        let expired = ApiError::from(ApplicationError::HandleExpired("h".into()));
        let missing = ApiError::from(ApplicationError::HandleNotFound("h".into()));
        assert_eq!(expired.errno(), errno::GONE);
        assert_eq!(missing.errno(), errno::NOT_FOUND);
        match expired {
            ApiError::Gone(msg) => assert_eq!(msg, HANDLE_EXPIRED_MESSAGE),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_fetch_failed_hides_cause() {
        let err = ApiError::from(ApplicationError::FetchFailed { kind: "not_found" });
        match err {
            ApiError::FetchFailed { reason, kind } => {
                assert_eq!(reason, FETCH_FAILED_MESSAGE);
                assert_eq!(kind, "not_found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
