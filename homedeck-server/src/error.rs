//! Error types for homedeck-server
//!
//! Every handler error becomes `{"error": {"code", "message"}}` with the
//! matching status. Messages never include absolute filesystem paths.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::services::directory_indexer::IndexError;
use crate::services::host_stats::StatsError;
use crate::services::job_controller::JobRejection;
use crate::services::path_sandbox::SandboxError;
use crate::services::service_registry::RegistryError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Path escapes its sandbox root (403)
    #[error("Access denied")]
    Forbidden,

    /// Conflict (409) - e.g., acquisition already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Required root directory not configured (500)
    #[error("Not configured: {0}")]
    Unconfigured(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// homedeck-common error
    #[error("Common error: {0}")]
    Common(#[from] homedeck_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Unconfigured(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "NOT_CONFIGURED",
                msg,
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Io(ref err) => {
                error!(error = %err, "I/O error while handling request");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "IO_ERROR",
                    "I/O error".to_string(),
                )
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<SandboxError> for ApiError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::AccessDenied => {
                warn!("Rejected path outside sandbox root");
                ApiError::Forbidden
            }
            SandboxError::RootNotAbsolute => {
                error!("Sandbox root is not an absolute path");
                ApiError::Unconfigured("Sandbox root must be an absolute path".to_string())
            }
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotFound(_) => ApiError::NotFound("Path not found".to_string()),
            IndexError::NotADirectory(_) => {
                ApiError::BadRequest("Path is not a directory".to_string())
            }
            IndexError::Io { path, source } => {
                error!(path = %path.display(), error = %source, "Directory indexing failed");
                ApiError::Internal("Failed to read directory.".to_string())
            }
        }
    }
}

impl From<JobRejection> for ApiError {
    fn from(rejection: JobRejection) -> Self {
        let message = rejection.to_string();
        match rejection {
            JobRejection::InvalidTarget => ApiError::BadRequest(message),
            JobRejection::AlreadyRunning => ApiError::Conflict(message),
            JobRejection::Unconfigured => ApiError::Unconfigured(message),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MissingFields => ApiError::BadRequest(err.to_string()),
            RegistryError::DuplicateUrl | RegistryError::DuplicateName => {
                ApiError::Conflict(err.to_string())
            }
            RegistryError::NotFound => ApiError::NotFound(err.to_string()),
            RegistryError::Io(_) | RegistryError::Parse(_) | RegistryError::Http(_) => {
                error!(error = %err, "Service registry failure");
                ApiError::Internal("Failed to access service registry.".to_string())
            }
        }
    }
}

impl From<StatsError> for ApiError {
    fn from(err: StatsError) -> Self {
        error!(error = %err, "Failed to fetch system stats");
        ApiError::Internal("Could not retrieve system statistics.".to_string())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
