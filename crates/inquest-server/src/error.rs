//! HTTP error mapping for the API surface.
//!
//! Failures that happen before a stream opens are plain HTTP errors. The
//! body reuses the wire `error` frame, so clients parse one error shape
//! whether it arrives as an SSE frame or as a rejected request.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use inquest_core::InvestigationEvent;
use inquest_core::events::codes;
use inquest_runtime::{RuntimeError, ServerBusy};

/// Errors returned by handlers before any SSE stream opens.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body cannot become a valid session.
    #[error("invalid investigation request: {0}")]
    Invalid(RuntimeError),

    /// Every investigation slot is taken.
    #[error(transparent)]
    Busy(#[from] ServerBusy),
}

impl ApiError {
    /// Status code this error maps onto.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Invalid(_) => StatusCode::BAD_REQUEST,
            Self::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn frame(&self) -> InvestigationEvent {
        match self {
            Self::Invalid(err) => {
                InvestigationEvent::error(err.error_code(), err.description(), err.to_string())
            }
            Self::Busy(err) => {
                InvestigationEvent::error(codes::GENERIC, "Server is at capacity", err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.frame())).into_response()
    }
}
