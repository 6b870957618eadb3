use std::any::Any;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

pub const NOT_FOUND_MESSAGE: &str = "Route not found";
pub const INTERNAL_MESSAGE: &str = "Something went wrong!";

/// ErrorBody
///
/// Every failure the gateway produces itself is answered with this fixed shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub message: String,
}

/// ApiError
///
/// The single mapping from a request failure to its HTTP response. Client-facing
/// messages are fixed strings; the attached detail only ever reaches the log.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("malformed JSON body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("missing or invalid credentials")]
    Unauthenticated,

    #[error("role not permitted for this route")]
    Forbidden,

    #[error("login rejected")]
    InvalidCredentials,

    #[error("no route matched")]
    NotFound,

    #[error("notification channel is not bound")]
    ChannelUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedBody(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthenticated | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ChannelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::MalformedBody(_) => "Invalid JSON payload",
            Self::PayloadTooLarge => "Payload too large",
            Self::Unauthenticated => "Authentication required",
            Self::Forbidden => "Access denied",
            Self::InvalidCredentials => "Invalid email or password",
            Self::NotFound => NOT_FOUND_MESSAGE,
            Self::ChannelUnavailable => "Notification channel unavailable",
            Self::Internal(_) => INTERNAL_MESSAGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) => tracing::error!(error = %detail, "request failed"),
            Self::MalformedBody(detail) => tracing::debug!(error = %detail, "rejected request body"),
            other => tracing::debug!(error = %other, "request rejected"),
        }

        let body = ErrorBody {
            message: self.public_message().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Internal(format!("token signing: {err}"))
    }
}

/// handle_panic
///
/// Response factory for `CatchPanicLayer`: a panicking handler is logged with its
/// message and answered with the same sanitized 500 as any other internal failure.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
