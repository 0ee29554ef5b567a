//! Forwarding proxy.
//!
//! # Responsibilities
//! - Send the transformed request to the route's collaborator
//! - Strip hop-by-hop headers in both directions
//! - Record the client address in `X-Forwarded-For`
//! - Remove every CORS header the collaborator set, so the origin gate's
//!   decision is the only one the browser sees
//! - Stream the response body back without buffering
//!
//! # Design Decisions
//! - Deadline covers the wait for response headers only; bodies stream
//! - Transport failure is 502, deadline expiry is 504; neither is retried
//! - A streamed body cut off by the size limit is 413, not a transport failure
//! - `Host` is dropped so the client sets it to the target authority

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Version};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::GatewayError;
use crate::http::upstream::Upstreams;
use crate::routing::Target;
use crate::security::exceeds_body_limit;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Headers meaningful only for a single connection.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwards requests to collaborators over the shared client pool.
pub struct ForwardingProxy {
    client: Client<HttpConnector, Body>,
    upstreams: Upstreams,
    timeout: Duration,
}

impl ForwardingProxy {
    pub fn new(client: Client<HttpConnector, Body>, upstreams: Upstreams, timeout: Duration) -> Self {
        Self {
            client,
            upstreams,
            timeout,
        }
    }

    /// Forward `request` to `target`, keeping the path and query it carries.
    pub async fn forward(
        &self,
        target: Target,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Response<Body>, GatewayError> {
        let (mut parts, body) = request.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let uri = self
            .upstreams
            .get(target)
            .uri(path_and_query)
            .map_err(|e| {
                tracing::error!(upstream = %target, error = %e, "Failed to build upstream URI");
                GatewayError::Internal
            })?;

        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);
        if let Some(addr) = client_addr {
            append_forwarded_for(&mut parts.headers, addr.ip());
        }
        parts.uri = uri;
        parts.version = Version::HTTP_11;

        let outbound = Request::from_parts(parts, body);
        let response = match tokio::time::timeout(self.timeout, self.client.request(outbound)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if exceeds_body_limit(&e) => {
                tracing::warn!(upstream = %target, "Request body too large");
                return Err(GatewayError::PayloadTooLarge);
            }
            Ok(Err(e)) => {
                tracing::error!(upstream = %target, error = %e, "Upstream request failed");
                return Err(GatewayError::BadGateway);
            }
            Err(_) => {
                tracing::error!(upstream = %target, timeout = ?self.timeout, "Upstream timed out");
                return Err(GatewayError::GatewayTimeout);
            }
        };

        let (mut parts, body) = response.into_parts();
        scrub_response_headers(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Remove hop-by-hop headers, including any the `Connection` header names.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Prepare collaborator response headers for the client.
pub fn scrub_response_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);

    let cors: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("access-control-"))
        .cloned()
        .collect();
    for name in cors {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{}, {}", prior, ip),
        _ => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
