use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::types::ErrorBody;

const GENERIC_MESSAGE: &str = "An error occurred while processing your request.";

#[derive(Debug, Error)]
pub enum EditError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed tool arguments: {0}")]
    MalformedToolArguments(String),

    #[error("Model requested unsupported tool: {0}")]
    UnsupportedTool(String),

    #[error("Image search returned no result for query: {0}")]
    ImageSearchFailed(String),

    #[error("{service} unavailable: {detail}")]
    UpstreamUnavailable {
        service: &'static str,
        detail: String,
    },

    #[error("{service} returned no usable content")]
    EmptyCompletion { service: &'static str },
}

/// Fieldless view of [`EditError`], for matching and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    MalformedToolArguments,
    UnsupportedTool,
    ImageSearchFailed,
    UpstreamUnavailable,
    EmptyCompletion,
}

impl EditError {
    pub fn upstream(service: &'static str, detail: impl Into<String>) -> Self {
        EditError::UpstreamUnavailable {
            service,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EditError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            EditError::MalformedToolArguments(_) => ErrorKind::MalformedToolArguments,
            EditError::UnsupportedTool(_) => ErrorKind::UnsupportedTool,
            EditError::ImageSearchFailed(_) => ErrorKind::ImageSearchFailed,
            EditError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            EditError::EmptyCompletion { .. } => ErrorKind::EmptyCompletion,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the browser. Client input errors describe
    /// the client's own data; everything else stays generic.
    pub fn public_message(&self) -> String {
        match self {
            EditError::InvalidRequest(reason) => reason.clone(),
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for EditError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = ?self.kind(), "edit failed: {}", self);
        } else {
            tracing::warn!(kind = ?self.kind(), "rejected request: {}", self);
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

pub type EditResult<T> = Result<T, EditError>;
