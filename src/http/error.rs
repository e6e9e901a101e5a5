//! Gateway error responses.
//!
//! Every error leaves the gateway as a JSON body `{"detail": "..."}` with
//! the status code below.
//!
//! | Error | Status |
//! |---|---|
//! | unknown service | 404 |
//! | unreadable request body | 400 |
//! | request body slower than the request timeout | 408 |
//! | oversized request body | 413 |
//! | upstream transport failure or timeout | 502 |
//! | no available backend | 503 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::load_balancer::SelectError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Service {0} not found")]
    ServiceNotFound(String),

    #[error("No available backends for {0}")]
    NoAvailableBackend(String),

    #[error("Request body could not be read: {0}")]
    Body(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Request body not received within {0} seconds")]
    BodyTimeout(u64),

    #[error("Backend request failed: {0}")]
    Upstream(String),

    #[error("Backend request timed out after {0} seconds")]
    UpstreamTimeout(u64),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ServiceNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::NoAvailableBackend(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Body(_) => StatusCode::BAD_REQUEST,
            GatewayError::BodyTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Upstream(_) | GatewayError::UpstreamTimeout(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<SelectError> for GatewayError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::ServiceNotFound(service) => GatewayError::ServiceNotFound(service),
            SelectError::NoAvailableBackend(service) => GatewayError::NoAvailableBackend(service),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
