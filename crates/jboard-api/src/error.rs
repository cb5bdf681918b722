//! API error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jboard_firestore::FirestoreError;
use jboard_models::{ApplicationStatus, LifecycleError};
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced to HTTP clients.
///
/// Every variant maps to a fixed status code and a stable machine-readable
/// `code` in the response body. Storage failures never leak their cause to
/// the client; the source is logged and the body carries only the context
/// message the handler chose.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    NotFound(String),

    #[error("You have already applied for this job")]
    AlreadyApplied,

    #[error("Application has already been {current}")]
    AlreadyDecided { current: ApplicationStatus },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    #[error("{context}")]
    Persistence {
        context: String,
        #[source]
        source: FirestoreError,
    },
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap a storage failure with the message the client should see.
    pub fn storage(context: impl Into<String>, source: FirestoreError) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyApplied | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyDecided { .. } => StatusCode::CONFLICT,
            Self::Internal(_) | Self::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::AccessDenied => "access_denied",
            Self::NotFound(_) => "not_found",
            Self::AlreadyApplied => "already_applied",
            Self::AlreadyDecided { .. } => "already_decided",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
            Self::Persistence { .. } => "persistence_error",
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AccessDenied => Self::AccessDenied,
            LifecycleError::AlreadyApplied => Self::AlreadyApplied,
            LifecycleError::AlreadyDecided { current } => Self::AlreadyDecided { current },
            LifecycleError::ApplicationNotFound(id) => {
                Self::NotFound(format!("Application {id} not found"))
            }
        }
    }
}

impl From<FirestoreError> for ApiError {
    fn from(err: FirestoreError) -> Self {
        Self::storage("Server error", err)
    }
}

/// Wire shape of every error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Persistence { context, source } => {
                tracing::error!(error = %source, context = %context, "Storage failure");
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
            }
            _ => {}
        }

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) | ApiError::Persistence { .. } => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: self.code().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    async fn response_body(err: ApiError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_production_redacts_internal_detail() {
        std::env::set_var("ENVIRONMENT", "production");
        let body = response_body(ApiError::storage(
            "Error fetching jobs",
            FirestoreError::request_failed("upstream exploded"),
        ))
        .await;
        std::env::remove_var("ENVIRONMENT");

        assert_eq!(body["detail"], "An internal error occurred");
        assert_eq!(body["code"], "persistence_error");
    }

    #[tokio::test]
    #[serial]
    async fn test_development_keeps_the_context_message() {
        std::env::remove_var("ENVIRONMENT");
        let body = response_body(ApiError::storage(
            "Error fetching jobs",
            FirestoreError::request_failed("upstream exploded"),
        ))
        .await;

        assert_eq!(body["detail"], "Error fetching jobs");
    }

    #[tokio::test]
    #[serial]
    async fn test_client_errors_are_never_redacted() {
        std::env::set_var("ENVIRONMENT", "production");
        let body = response_body(ApiError::AlreadyApplied).await;
        std::env::remove_var("ENVIRONMENT");

        assert_eq!(body["detail"], "You have already applied for this job");
        assert_eq!(body["code"], "already_applied");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::unauthorized("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::AccessDenied.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::not_found("Job not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::AlreadyApplied.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::AlreadyDecided {
                current: ApplicationStatus::Accepted
            }
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_lifecycle_errors_keep_their_messages() {
        let err: ApiError = LifecycleError::AlreadyApplied.into();
        assert_eq!(err.to_string(), "You have already applied for this job");
        assert_eq!(err.code(), "already_applied");

        let err: ApiError = LifecycleError::AccessDenied.into();
        assert_eq!(err.to_string(), "Access denied");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_storage_errors_hide_their_source() {
        let err = ApiError::storage(
            "Error fetching jobs",
            FirestoreError::request_failed("http://internal:8080 exploded"),
        );
        assert_eq!(err.to_string(), "Error fetching jobs");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_decided_conflict_names_current_status() {
        let err = ApiError::AlreadyDecided {
            current: ApplicationStatus::Rejected,
        };
        assert!(err.to_string().contains("rejected"));
        assert_eq!(err.code(), "already_decided");
    }
}
