//! Request-path failure taxonomy.
//!
//! Every terminal failure the gateway can produce maps to exactly one
//! variant here, and every variant renders as `{"error": "<message>"}` with a
//! fixed status code. Messages are static so that collaborator addresses and
//! transport details only ever reach the log.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No session, or the auth service rejected it outright.
    #[error("unauthorized")]
    Unauthorized,

    /// Session rejected and the one refresh attempt did not succeed.
    #[error("session expired")]
    SessionExpired,

    /// Session was accepted but the caller's identity could not be resolved.
    #[error("failed to get user id")]
    IdentityUnavailable,

    /// Transport failure talking to the authentication service.
    #[error("auth service unavailable")]
    AuthServiceUnavailable,

    /// Body required for identity injection is not a JSON object.
    #[error("invalid payload")]
    InvalidPayload,

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    /// Request body exceeds `limits.max_body_bytes`.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Whole-request deadline (`timeouts.request_secs`) elapsed.
    #[error("request timed out")]
    RequestTimeout,

    /// Transport failure talking to any non-auth collaborator.
    #[error("upstream unavailable")]
    BadGateway,

    /// Forward deadline elapsed before response headers arrived.
    #[error("upstream timed out")]
    GatewayTimeout,

    #[error("internal error")]
    Internal,
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized
            | GatewayError::SessionExpired
            | GatewayError::IdentityUnavailable => StatusCode::UNAUTHORIZED,
            GatewayError::AuthServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::InvalidPayload => StatusCode::BAD_REQUEST,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::BadGateway => StatusCode::BAD_GATEWAY,
            GatewayError::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
