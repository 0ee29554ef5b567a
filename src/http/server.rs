//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router: `/health` plus one fallback running the pipeline
//! - Wire up middleware (request ID, tracing, origin gate, deadline, body limit)
//! - Build the shared outbound client and every component that uses it
//! - Run the dispatch pipeline for each request
//! - Bind to a listener and stop on the shutdown signal
//!
//! # Data Flow
//! ```text
//! origin gate (preflights end here)
//!     → request deadline (408), declared body length (413)
//!     → RouteTable::resolve            (404 / 405)
//!     → SessionValidator::validate     (auth routes only; 401 / 503)
//!     → SessionValidator::resolve_identity (identity-injecting routes only)
//!     → transform::apply               (400 / 401 / 413)
//!     → ForwardingProxy / MonitoringRelay (502 / 504)
//!     → refresh Set-Cookies appended to whatever response resulted
//! ```

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{HttpAuthClient, SessionValidator, AUTH_CALL_TIMEOUT};
use crate::config::validation::{validate_config, ValidationError};
use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::http::monitoring::MonitoringRelay;
use crate::http::proxy::ForwardingProxy;
use crate::http::request::{request_id, MakeGatewayRequestId, X_REQUEST_ID};
use crate::http::transform;
use crate::http::upstream::Upstreams;
use crate::observability::metrics;
use crate::routing::{NoMatch, Route, RouteTable, Target};
use crate::security::{origin_gate, reject_oversized_body, request_deadline_error, OriginPolicy};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub validator: Arc<SessionValidator<HttpAuthClient>>,
    pub proxy: Arc<ForwardingProxy>,
    pub monitoring: Arc<MonitoringRelay>,
    pub body_limit: usize,
}

/// The gateway's HTTP server.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Validate `config` and build every component from it.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let upstreams = Upstreams::from_config(&config.upstreams)
            .map_err(|e| ConfigError::Validation(vec![ValidationError::new("upstreams", e)]))?;

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client: Client<HttpConnector, Body> =
            Client::builder(TokioExecutor::new()).build(connector);

        let auth = HttpAuthClient::new(
            client.clone(),
            upstreams.get(Target::Auth).clone(),
            AUTH_CALL_TIMEOUT,
        );
        let forward_timeout = Duration::from_secs(config.timeouts.forward_secs);

        let state = AppState {
            routes: Arc::new(RouteTable::gateway_default()),
            validator: Arc::new(SessionValidator::new(auth)),
            monitoring: Arc::new(MonitoringRelay::new(
                client.clone(),
                upstreams.get(Target::Monitoring).clone(),
                forward_timeout,
            )),
            proxy: Arc::new(ForwardingProxy::new(client, upstreams, forward_timeout)),
            body_limit: config.limits.max_body_bytes,
        };
        let policy = Arc::new(OriginPolicy::new(&config.cors.allowed_origins));

        let router = Self::build_router(&config, state, policy);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState, policy: Arc<OriginPolicy>) -> Router {
        let body_limit = config.limits.max_body_bytes;

        Router::new()
            .route(
                "/health",
                get(health_handler).fallback(health_method_not_allowed),
            )
            .fallback(gateway_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(body_limit))
            .layer(middleware::from_fn_with_state(body_limit, reject_oversized_body))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(request_deadline_error))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
            .layer(middleware::from_fn_with_state(policy, origin_gate))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let id = request_id(request.headers())
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    request_id = %id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeGatewayRequestId))
    }

    /// The assembled router, for driving the gateway without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            auth = %self.config.upstreams.auth,
            backend = %self.config.upstreams.backend,
            node = %self.config.upstreams.node,
            monitoring = %self.config.upstreams.monitoring,
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "api-gateway" }))
}

async fn health_method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

/// Fallback handler: every path except `/health` runs the pipeline.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id(request.headers()).cloned();
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let route = match state.routes.resolve(&method, &path) {
        Ok(route) => route,
        Err(no_match) => {
            let error = match no_match {
                NoMatch::Path => GatewayError::NotFound,
                NoMatch::Method => GatewayError::MethodNotAllowed,
            };
            tracing::warn!(method = %method, path = %path, error = %error, "No route matched");
            metrics::record_request(method.as_str(), error.status().as_u16(), "none", start);
            return error.into_response();
        }
    };

    tracing::debug!(route = route.name, upstream = %route.target, "Route resolved");

    let mut refreshed_cookies = Vec::new();
    let outcome = dispatch(
        &state,
        route,
        request,
        request_id.as_ref(),
        client_addr,
        &mut refreshed_cookies,
    )
    .await;

    let mut response = match outcome {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(route = route.name, error = %error, "Request failed");
            error.into_response()
        }
    };
    for cookie in refreshed_cookies {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    metrics::record_request(
        method.as_str(),
        response.status().as_u16(),
        route.name,
        start,
    );
    response
}

/// Authenticate, transform and forward one routed request.
///
/// Refresh cookies are handed back through `refreshed_cookies` so they reach
/// the client even when a later stage fails.
async fn dispatch(
    state: &AppState,
    route: &Route,
    request: Request<Body>,
    request_id: Option<&HeaderValue>,
    client_addr: Option<SocketAddr>,
    refreshed_cookies: &mut Vec<HeaderValue>,
) -> Result<Response<Body>, GatewayError> {
    let mut identity = None;

    if route.requires_auth {
        let session = state.validator.validate(request.headers(), request_id).await?;
        *refreshed_cookies = session.refreshed_cookies;

        if route.transform.needs_identity(request.method()) {
            // A missing identity is reported by the transformer, after the
            // body has been checked.
            identity = match state
                .validator
                .resolve_identity(&session.token, request_id)
                .await
            {
                Ok(identity) => Some(identity),
                Err(failure) => {
                    tracing::warn!(route = route.name, error = %failure, "Identity unresolved");
                    None
                }
            };
        }
    }

    let outbound = transform::apply(route, identity.as_ref(), request, state.body_limit).await?;

    match route.target {
        Target::Monitoring => state.monitoring.relay(outbound.uri(), request_id).await,
        target => state.proxy.forward(target, outbound, client_addr).await,
    }
}
