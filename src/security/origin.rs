//! Origin policy gate.
//!
//! # Responsibilities
//! - Decide per request whether the declared `Origin` is on the allow-list
//! - Echo allowed origins with credentials and the fixed method/header set
//! - Answer every preflight (`OPTIONS`) immediately with 204
//!
//! # Design Decisions
//! - A denied origin gets no CORS headers but is still served; the browser
//!   enforces the block
//! - Preflights never reach routing, so they are answered for every path
//! - The allow-list is exact string match, fixed at startup

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

const ALLOW_METHODS: HeaderValue = HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS");
const ALLOW_HEADERS: HeaderValue = HeaderValue::from_static("Content-Type, Authorization");

/// Outcome of checking a request's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// Echo this origin back.
    Allow(HeaderValue),
    Deny,
}

/// Allow-list of browser origins.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: HashSet<String>,
}

impl OriginPolicy {
    pub fn new(allowed_origins: &[String]) -> Self {
        Self {
            allowed: allowed_origins.iter().cloned().collect(),
        }
    }

    pub fn decide(&self, headers: &HeaderMap) -> OriginDecision {
        match headers.get(header::ORIGIN) {
            Some(origin)
                if origin
                    .to_str()
                    .map(|o| self.allowed.contains(o))
                    .unwrap_or(false) =>
            {
                OriginDecision::Allow(origin.clone())
            }
            _ => OriginDecision::Deny,
        }
    }

    /// Write the CORS headers for `decision` onto a response.
    pub fn apply(decision: &OriginDecision, headers: &mut HeaderMap) {
        let OriginDecision::Allow(origin) = decision else {
            return;
        };
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);
        headers.append(header::VARY, HeaderValue::from_static("origin"));
    }
}

/// Middleware enforcing the origin policy.
pub async fn origin_gate(
    State(policy): State<Arc<OriginPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = policy.decide(request.headers());

    let mut response = if request.method() == Method::OPTIONS {
        tracing::debug!(
            path = %request.uri().path(),
            allowed = matches!(decision, OriginDecision::Allow(_)),
            "Answering preflight"
        );
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        response
    } else {
        next.run(request).await
    };

    OriginPolicy::apply(&decision, response.headers_mut());
    response
}
