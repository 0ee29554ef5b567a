//! Request size and time limits.
//!
//! # Responsibilities
//! - Reject bodies whose declared `Content-Length` exceeds the limit
//! - Recognise a body read that failed because the limit was hit
//! - Turn an expired whole-request deadline into a JSON error
//!
//! # Design Decisions
//! - Declared lengths are refused before routing or authentication
//! - Undeclared (chunked) bodies are capped by `RequestBodyLimitLayer`; the
//!   overrun surfaces when the body is read and is reported the same way
//! - Every rejection is a `GatewayError`, so clients always get JSON

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    BoxError,
};
use http_body_util::LengthLimitError;
use std::error::Error as StdError;

use crate::error::GatewayError;

/// Middleware refusing requests that declare a body larger than the limit.
pub async fn reject_oversized_body(
    State(limit): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    match declared {
        Some(length) if length > limit as u64 => {
            tracing::warn!(length, limit, "Request body too large");
            GatewayError::PayloadTooLarge.into_response()
        }
        _ => next.run(request).await,
    }
}

/// Error handler for the whole-request timeout.
pub async fn request_deadline_error(error: BoxError) -> GatewayError {
    if error.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("Request deadline elapsed");
        GatewayError::RequestTimeout
    } else {
        tracing::error!(error = %error, "Unhandled middleware error");
        GatewayError::Internal
    }
}

/// Whether an error was caused by the body size limit, at any depth of its
/// source chain.
pub fn exceeds_body_limit(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
