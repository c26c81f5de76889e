//! Error handling module
//!
//! `BootstrapError` covers failures while wiring the application; they are fatal
//! for the process. `ApiError` is the request-time error returned by resource
//! handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::db::is_connection_error;

/// Failure while building the application. There is no recovery path.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// `APP_ENV` names a profile that does not exist
    #[error("Unknown configuration profile: '{0}'")]
    UnknownProfile(String),

    /// A setting could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The persistence handle could not be created
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Two resource groups were registered under the same name
    #[error("Resource group '{0}' is already registered")]
    DuplicateGroup(String),

    /// Binding or serving the listener failed
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unauthorized - bad credentials or forbidden token use
    #[error("{0}")]
    Unauthorized(String),

    /// Forbidden - authenticated but not allowed to touch the resource
    #[error("{0}")]
    Forbidden(String),

    /// Not found - requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Conflict - resource already exists
    #[error("{0}")]
    Conflict(String),

    /// Unprocessable entity - request body failed validation
    #[error("{0}")]
    Validation(String),

    /// Internal server error - unexpected server-side failure
    #[error("{0}")]
    Internal(String),

    /// Service unavailable - a dependency (database) is not reachable
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Message safe to show to the client
    fn client_message(&self) -> String {
        match self {
            // Internal details stay in the logs
            Self::Internal(_) => "An internal error occurred.".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if is_connection_error(&err) {
            Self::service_unavailable("Database is not reachable.")
        } else {
            Self::internal(format!("Database error: {err}"))
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let internal_message = self.to_string();

        match &self {
            Self::Internal(_) | Self::ServiceUnavailable(_) => {
                tracing::error!(status = %status, error = %internal_message, "Server error");
            }
            _ => {
                tracing::warn!(status = %status, error = %internal_message, "Client error");
            }
        }

        let body = serde_json::json!({
            "code": status.as_u16(),
            "status": status.canonical_reason().unwrap_or("Unknown"),
            "message": self.client_message(),
        });

        (status, Json(body)).into_response()
    }
}
