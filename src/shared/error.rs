//! Application Error Types
//!
//! The error taxonomy shared by HTTP handlers and socket handlers, and the
//! terminal conversion into the `{message, status, kind}` wire shape.

use std::any::Any;

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        ws::rejection::WebSocketUpgradeRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error kind tag. Carries the status code and default message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    ServerError,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not found",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::ServerError => "Internal server error",
        }
    }
}

/// Application error type.
///
/// `None` messages fall back to the kind's default message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{}", message_or(.0, ErrorKind::BadRequest))]
    BadRequest(Option<String>),

    #[error("{}", message_or(.0, ErrorKind::Unauthorized))]
    Unauthorized(Option<String>),

    #[error("{}", message_or(.0, ErrorKind::Forbidden))]
    Forbidden(Option<String>),

    #[error("{}", message_or(.0, ErrorKind::NotFound))]
    NotFound(Option<String>),

    #[error("{}", message_or(.0, ErrorKind::Conflict))]
    Conflict(Option<String>),

    #[error("{}", message_or(.0, ErrorKind::ServerError))]
    ServerError(Option<String>),

    /// Anything outside the taxonomy. Logged with detail, answered as a
    /// redacted `ServerError`.
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

fn message_or(message: &Option<String>, kind: ErrorKind) -> &str {
    message.as_deref().unwrap_or(kind.default_message())
}

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub status: u16,
    pub kind: ErrorKind,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(Some(message.into()))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        AppError::Unauthorized(Some(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden(Some(message.into()))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(Some(message.into()))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(Some(message.into()))
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        AppError::ServerError(Some(message.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::Unauthorized(_) => ErrorKind::Unauthorized,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::ServerError(_) | AppError::Unexpected(_) => ErrorKind::ServerError,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    /// Log the error and produce its wire body.
    ///
    /// This is the only place a typed error is logged and serialized; the
    /// HTTP terminal handler and the socket event router both go through it.
    pub fn report(&self) -> ErrorResponse {
        let kind = self.kind();
        let message = match self {
            AppError::ServerError(_) => {
                tracing::error!(error = %self, "Server error");
                kind.default_message().to_string()
            }
            AppError::Unexpected(e) => {
                tracing::error!(error = ?e, "Unexpected error outside the taxonomy");
                kind.default_message().to_string()
            }
            _ => {
                tracing::warn!(kind = ?kind, error = %self, "Request failed");
                self.to_string()
            }
        };

        ErrorResponse {
            message,
            status: kind.status().as_u16(),
            kind,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = self.report();
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

impl From<WebSocketUpgradeRejection> for AppError {
    fn from(rejection: WebSocketUpgradeRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

/// Panic handler for `tower_http::catch_panic::CatchPanicLayer`.
///
/// The panic payload is logged but never sent to the client.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Unexpected(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}
