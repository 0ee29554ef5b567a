//! Request transformation.
//!
//! # Responsibilities
//! - Rewrite the outbound path (prefix replacement, identity-scoped paths)
//! - Assert the caller's identity inside JSON bodies
//! - Keep `Content-Length` consistent with a replaced body
//!
//! # Design Decisions
//! - Only routes that declare identity injection ever buffer the body;
//!   every other body streams through untouched
//! - Server-asserted identity overwrites any client-supplied value
//! - Query strings survive every path rewrite

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Uri};
use serde_json::{Map, Value};

use crate::auth::Identity;
use crate::error::GatewayError;
use crate::routing::{carries_body, Route, Transform};
use crate::security::exceeds_body_limit;

/// Placeholder substituted in identity-scoped paths.
const IDENTITY_PLACEHOLDER: &str = "{identity}";

/// Turn the inbound request into the one the route's target expects.
pub async fn apply(
    route: &Route,
    identity: Option<&Identity>,
    request: Request<Body>,
    body_limit: usize,
) -> Result<Request<Body>, GatewayError> {
    match &route.transform {
        Transform::None => Ok(request),
        Transform::RewritePrefix { from, to } => {
            let (mut parts, body) = request.into_parts();
            let path = rewrite_prefix(parts.uri.path(), from, to);
            parts.uri = with_path(&parts.uri, &path)?;
            Ok(Request::from_parts(parts, body))
        }
        Transform::InjectIdentity { field, scoped_path } => {
            let method = request.method().clone();

            if method == Method::GET {
                let Some(template) = scoped_path else {
                    return Ok(request);
                };
                let identity = identity.ok_or(GatewayError::IdentityUnavailable)?;
                let path = scoped_path_for(template, identity)?;
                let (mut parts, body) = request.into_parts();
                parts.uri = with_path(&parts.uri, &path)?;
                return Ok(Request::from_parts(parts, body));
            }

            if !carries_body(&method) {
                return Ok(request);
            }

            let (mut parts, body) = request.into_parts();
            let bytes = axum::body::to_bytes(body, body_limit).await.map_err(|e| {
                if exceeds_body_limit(&e) {
                    tracing::warn!(route = route.name, limit = body_limit, "Request body too large");
                    GatewayError::PayloadTooLarge
                } else {
                    tracing::warn!(error = %e, route = route.name, "Failed to read request body");
                    GatewayError::InvalidPayload
                }
            })?;
            let rewritten = inject_identity_field(&bytes, field, identity)?;

            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));
            parts.headers.remove(header::TRANSFER_ENCODING);
            Ok(Request::from_parts(parts, Body::from(rewritten)))
        }
    }
}

/// Replace `from` with `to` when the path starts with `from`.
pub fn rewrite_prefix(path: &str, from: &str, to: &str) -> String {
    match path.strip_prefix(from) {
        Some(rest) => format!("{}{}", to, rest),
        None => path.to_string(),
    }
}

/// Set `field` to the caller's identity in a JSON object body.
///
/// The body must parse as an object before identity is considered, so a
/// malformed body is reported as such even when identity is missing.
pub fn inject_identity_field(
    body: &[u8],
    field: &str,
    identity: Option<&Identity>,
) -> Result<Vec<u8>, GatewayError> {
    let mut object: Map<String, Value> =
        serde_json::from_slice(body).map_err(|_| GatewayError::InvalidPayload)?;
    let identity = identity.ok_or(GatewayError::IdentityUnavailable)?;

    object.insert(field.to_string(), Value::String(identity.as_str().to_string()));
    serde_json::to_vec(&object).map_err(|_| GatewayError::Internal)
}

/// Substitute the identity into a path template.
///
/// Identities outside the URL-unreserved alphabet, and dot-only segments,
/// are refused rather than spliced into a path.
pub fn scoped_path_for(template: &str, identity: &Identity) -> Result<String, GatewayError> {
    let value = identity.as_str();
    let safe = !value.bytes().all(|b| b == b'.')
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'));
    if !safe {
        tracing::warn!("Identity is not path-safe");
        return Err(GatewayError::IdentityUnavailable);
    }
    Ok(template.replace(IDENTITY_PLACEHOLDER, identity.as_str()))
}

fn with_path(uri: &Uri, path: &str) -> Result<Uri, GatewayError> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse().map_err(|e| {
        tracing::error!(error = %e, "Rewritten path is not a valid URI");
        GatewayError::Internal
    })?);
    Uri::from_parts(parts).map_err(|_| GatewayError::Internal)
}
