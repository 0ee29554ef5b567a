//! Monitoring fan-out.
//!
//! Monitoring routes are read-only pass-throughs: the gateway issues its own
//! GET to the monitoring service and relays status and body unchanged,
//! always labelled as JSON. Inbound headers are not forwarded apart from the
//! request ID.

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, Response, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use std::time::Duration;

use crate::error::GatewayError;
use crate::http::request::X_REQUEST_ID;
use crate::http::upstream::Upstream;

const MAX_REPLY_BYTES: usize = 8 * 1024 * 1024;

pub struct MonitoringRelay {
    client: Client<HttpConnector, Body>,
    upstream: Upstream,
    timeout: Duration,
}

impl MonitoringRelay {
    pub fn new(client: Client<HttpConnector, Body>, upstream: Upstream, timeout: Duration) -> Self {
        Self {
            client,
            upstream,
            timeout,
        }
    }

    /// GET `uri`'s path and query from the monitoring service.
    pub async fn relay(
        &self,
        uri: &Uri,
        request_id: Option<&HeaderValue>,
    ) -> Result<Response<Body>, GatewayError> {
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let upstream_uri = self.upstream.uri(path_and_query).map_err(|e| {
            tracing::error!(error = %e, "Failed to build monitoring URI");
            GatewayError::Internal
        })?;

        let mut builder = Request::builder().method(Method::GET).uri(upstream_uri);
        if let Some(id) = request_id {
            builder = builder.header(X_REQUEST_ID, id.clone());
        }
        let request = builder.body(Body::empty()).map_err(|_| GatewayError::Internal)?;

        let exchange = async {
            let response = self.client.request(request).await.map_err(|e| {
                tracing::error!(error = %e, "Monitoring service unreachable");
                GatewayError::BadGateway
            })?;
            let status = response.status();
            let body = axum::body::to_bytes(Body::new(response.into_body()), MAX_REPLY_BYTES)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to read monitoring reply");
                    GatewayError::BadGateway
                })?;
            Ok::<_, GatewayError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                tracing::error!(timeout = ?self.timeout, "Monitoring service timed out");
                GatewayError::GatewayTimeout
            })??;

        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|_| GatewayError::Internal)
    }
}
