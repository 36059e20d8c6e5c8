//! JSON envelope returned by every command route.

use std::any::Any;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::commands::{CommandError, ErrorKind};

/// `{"succeeded": bool, "value": T | null, "error": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub succeeded: bool,
    pub value: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn succeed(value: T) -> Self {
        Self {
            succeeded: true,
            value: Some(value),
            error: None,
        }
    }

    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            value: None,
            error: Some(ErrorBody {
                kind,
                message: message.into(),
            }),
        }
    }
}

/// A failure on its way out of the HTTP layer.
#[derive(Debug)]
pub enum ApiError {
    Command(CommandError),
    /// The request body was not a JSON object of the expected shape.
    Body(JsonRejection),
}

impl From<CommandError> for ApiError {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Command(err) => err,
            Self::Body(rejection) => {
                let message = rejection.body_text();
                tracing::warn!("Malformed request body: {}", message);
                return failure(ErrorKind::BadRequest, message);
            }
        };
        let kind = err.kind();

        // Internal details stay in the log; clients get a generic message.
        let message = match kind {
            ErrorKind::Internal => {
                tracing::error!("Internal error: {}", err);
                "Internal server error".to_string()
            }
            _ => {
                tracing::warn!(kind = kind.as_str(), "Command rejected: {}", err);
                err.to_string()
            }
        };

        failure(kind, message)
    }
}

fn failure(kind: ErrorKind, message: String) -> Response {
    (status_for(kind), Json(ApiResponse::<()>::fail(kind, message))).into_response()
}

/// Turn a panic caught by `CatchPanicLayer` into a 500 envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    failure(ErrorKind::Internal, "Internal server error".to_string())
}
