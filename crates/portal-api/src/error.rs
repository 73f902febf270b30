//! Error taxonomy for the messaging API.
//!
//! Every failure ends in a JSON envelope `{status, message}` whose `status`
//! matches the HTTP status line. Storage details are logged, never returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use portal_types::api::Envelope;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no valid session")]
    Unauthenticated,

    /// Malformed arguments. Carries the public message ("Invalid input",
    /// "Invalid ID").
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("invalid conversation target")]
    InvalidTarget,

    #[error("empty routing string")]
    MissingRequest,

    /// The message is missing or belongs to someone else. Deliberately one
    /// variant for both.
    #[error("not permitted or not found")]
    Forbidden,

    #[error("message body too long")]
    PayloadTooLarge,

    #[error("{context}: {cause}")]
    StorageFailure {
        context: &'static str,
        cause: anyhow::Error,
    },

    #[error("unknown endpoint")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn storage(context: &'static str, cause: anyhow::Error) -> Self {
        Self::StorageFailure { context, cause }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidInput(_) | Self::InvalidTarget | Self::MissingRequest => {
                StatusCode::BAD_REQUEST
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::StorageFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Text placed in the response envelope.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Unauthorized",
            Self::InvalidInput(message) => *message,
            Self::InvalidTarget => "Invalid user target",
            Self::MissingRequest => "No request given",
            Self::Forbidden => "Not permitted or not found",
            Self::PayloadTooLarge => "Message too long",
            Self::StorageFailure { context, .. } => *context,
            Self::NotFound => "Endpoint not found",
            Self::MethodNotAllowed => "Method Not Allowed",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::StorageFailure { .. } => error!("{}", self),
            Self::Forbidden => warn!("Rejected write: {}", self),
            _ => {}
        }

        let status = self.status_code();
        let body = Envelope::error(status.as_u16(), self.public_message());
        (status, Json(body)).into_response()
    }
}
