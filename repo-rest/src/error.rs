//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::{RepositoryError, RepositoryErrorKind};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the REST layer
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Structured storage error
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(Box<axum::http::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The authorization gate refused the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Method/path combination rejected under the strict routing policy
    #[error("Method not supported: {0}")]
    MethodNotSupported(String),

    /// A declared collaborator was never supplied
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// Error raised by user-supplied handler or listener code
    #[error("Handler error: {0}")]
    Handler(#[from] anyhow::Error),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

impl Error {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Repository(e) => repository_status(e.kind),
            Error::Http(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::Config(_)
            | Error::Io(_)
            | Error::Misconfigured(_)
            | Error::Handler(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn repository_status(kind: RepositoryErrorKind) -> StatusCode {
    match kind {
        RepositoryErrorKind::NotFound => StatusCode::NOT_FOUND,
        RepositoryErrorKind::AlreadyExists | RepositoryErrorKind::ConstraintViolation => {
            StatusCode::CONFLICT
        }
        RepositoryErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        RepositoryErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
        RepositoryErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        RepositoryErrorKind::TransactionFailed
        | RepositoryErrorKind::SerializationError
        | RepositoryErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = match self {
            Error::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                ErrorResponse::with_code(status, "CONFIG_ERROR", e.to_string())
            }

            Error::Repository(ref e) => {
                let code = format!("REPOSITORY_{}", e.kind.to_string().to_uppercase());
                if status.is_server_error() {
                    tracing::error!(
                        operation = %e.operation,
                        kind = %e.kind,
                        entity_type = ?e.entity_type,
                        entity_id = ?e.entity_id,
                        retriable = e.is_retriable(),
                        "Repository error: {}", e.message
                    );
                    let user_message = match e.kind {
                        RepositoryErrorKind::Unsupported => e.message.as_str(),
                        RepositoryErrorKind::Unavailable => "Storage temporarily unavailable",
                        _ => "Storage operation failed",
                    };
                    ErrorResponse::with_code(status, code, user_message)
                } else {
                    tracing::debug!(
                        operation = %e.operation,
                        kind = %e.kind,
                        "Repository error: {}", e.message
                    );
                    ErrorResponse::with_code(status, code, e.message.clone())
                }
            }

            Error::Http(e) => ErrorResponse::with_code(status, "HTTP_ERROR", e.to_string()),

            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                ErrorResponse::with_code(status, "IO_ERROR", "I/O operation failed")
            }

            Error::Forbidden(msg) => ErrorResponse::with_code(status, "FORBIDDEN", msg),

            Error::NotFound(msg) => ErrorResponse::with_code(status, "NOT_FOUND", msg),

            Error::BadRequest(msg) => {
                tracing::debug!("Bad request: {}", msg);
                ErrorResponse::with_code(status, "BAD_REQUEST", msg)
            }

            Error::MethodNotSupported(msg) => {
                ErrorResponse::with_code(status, "METHOD_NOT_SUPPORTED", msg)
            }

            Error::Misconfigured(msg) => {
                tracing::error!("Misconfigured: {}", msg);
                ErrorResponse::with_code(status, "MISCONFIGURED", "Service is misconfigured")
            }

            Error::Handler(e) => {
                tracing::error!("Handler error: {:#}", e);
                ErrorResponse::with_code(status, "HANDLER_ERROR", "Internal server error")
            }

            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ErrorResponse::with_code(status, "INTERNAL_ERROR", "Internal server error")
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<axum::http::Error> for Error {
    fn from(err: axum::http::Error) -> Self {
        Error::Http(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RepositoryOperation;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new(StatusCode::NOT_FOUND, "Item not found");
        assert_eq!(err.status, 404);
        assert_eq!(err.error, "Item not found");
        assert!(err.code.is_none());
    }

    #[test]
    fn test_error_response_with_code() {
        let err = ErrorResponse::with_code(StatusCode::FORBIDDEN, "FORBIDDEN", "putItem denied");
        assert_eq!(err.status, 403);
        assert_eq!(err.code, Some("FORBIDDEN".to_string()));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(Error::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::MethodNotSupported("x".into()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            Error::Handler(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_status_mapping() {
        let status = |e: RepositoryError| Error::from(e).status_code();
        assert_eq!(status(RepositoryError::not_found("people", "1")), StatusCode::NOT_FOUND);
        let taken = RepositoryError::new(
            RepositoryOperation::SaveItem,
            RepositoryErrorKind::AlreadyExists,
            "id taken",
        );
        assert_eq!(status(taken), StatusCode::CONFLICT);
        assert_eq!(
            status(RepositoryError::validation_failed(RepositoryOperation::CreateItem, "bad")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(RepositoryError::unavailable(RepositoryOperation::FindItems, "down")),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(RepositoryError::transaction_failed("lost")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = Error::Forbidden("deleteItem on people".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.status, 403);
        assert_eq!(body.code.as_deref(), Some("FORBIDDEN"));
        assert_eq!(body.error, "deleteItem on people");
    }
}
