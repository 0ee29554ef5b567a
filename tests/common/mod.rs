//! Shared utilities for integration and load testing.
//!
//! Collaborators are real axum servers on ephemeral ports. Each records the
//! requests it receives so tests can assert what the gateway sent.

#![allow(dead_code)]

use api_gateway::config::GatewayConfig;
use api_gateway::{GatewayServer, Shutdown};
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

pub const ALLOWED_ORIGIN: &str = "http://localhost:5173";

/// Session tokens understood by the mock auth service.
pub const VALID_TOKEN: &str = "valid";
pub const EXPIRED_TOKEN: &str = "expired";
pub const FORBIDDEN_TOKEN: &str = "forbidden";

/// Refresh credential the mock auth service accepts.
pub const GOOD_REFRESH: &str = "refresh_token=good";

pub const MOCK_UID: &str = "u1";

/// A request as a mock collaborator saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Requests received by one mock collaborator, in arrival order.
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<Recorded>>>);

impl Recorder {
    pub fn all(&self) -> Vec<Recorded> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Recorded {
        self.all().pop().expect("no request recorded")
    }

    async fn record(&self, request: Request<Body>) -> Recorded {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let recorded = Recorded {
            method: parts.method.to_string(),
            uri: parts.uri.to_string(),
            headers: parts.headers,
            body,
        };
        self.0.lock().unwrap().push(recorded.clone());
        recorded
    }
}

/// Serve `router` on an ephemeral port.
pub async fn spawn_mock(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn session_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "session_token")
        .map(|(_, value)| value.to_string())
}

/// Mock auth service.
///
/// `/auth/me` answers by token: `valid` → 200 with `uid`, `expired` → 401,
/// anything else → 403. `/auth/refresh` succeeds only when the cookie header
/// carries `refresh_token=good`. Other `/auth/*` paths echo.
pub async fn spawn_auth(recorder: Recorder) -> SocketAddr {
    let me = {
        let recorder = recorder.clone();
        move |request: Request<Body>| {
            let recorder = recorder.clone();
            async move {
                let seen = recorder.record(request).await;
                match session_of(&seen.headers).as_deref() {
                    Some(VALID_TOKEN) => {
                        (StatusCode::OK, Json(json!({ "uid": MOCK_UID }))).into_response()
                    }
                    Some(EXPIRED_TOKEN) => StatusCode::UNAUTHORIZED.into_response(),
                    _ => StatusCode::FORBIDDEN.into_response(),
                }
            }
        }
    };
    let refresh = {
        let recorder = recorder.clone();
        move |request: Request<Body>| {
            let recorder = recorder.clone();
            async move {
                let seen = recorder.record(request).await;
                let cookies = seen
                    .headers
                    .get(header::COOKIE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if !cookies.contains(GOOD_REFRESH) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                let mut response = Json(json!({ "refreshed": true })).into_response();
                let headers = response.headers_mut();
                headers.append(
                    header::SET_COOKIE,
                    HeaderValue::from_static("session_token=fresh; Path=/; HttpOnly"),
                );
                headers.append(
                    header::SET_COOKIE,
                    HeaderValue::from_static("refresh_token=rotated; Path=/; HttpOnly"),
                );
                response
            }
        }
    };
    let other = move |request: Request<Body>| {
        let recorder = recorder.clone();
        async move {
            let seen = recorder.record(request).await;
            Json(json!({ "service": "auth", "uri": seen.uri }))
        }
    };

    spawn_mock(
        Router::new()
            .route("/auth/me", get(me))
            .route("/auth/refresh", post(refresh))
            .fallback(other),
    )
    .await
}

/// Mock service that echoes what it received and sets permissive CORS
/// headers the gateway must remove.
pub async fn spawn_echo(service: &'static str, recorder: Recorder) -> SocketAddr {
    spawn_mock(Router::new().fallback(move |request: Request<Body>| {
        let recorder = recorder.clone();
        async move {
            let seen = recorder.record(request).await;
            echo_response(service, &seen)
        }
    }))
    .await
}

fn echo_response(service: &str, seen: &Recorded) -> Response {
    let mut response = Json(json!({
        "service": service,
        "method": seen.method,
        "uri": seen.uri,
    }))
    .into_response();
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-credentials", HeaderValue::from_static("true"));
    headers.insert("access-control-allow-headers", HeaderValue::from_static("*"));
    headers.insert("access-control-allow-methods", HeaderValue::from_static("*"));
    headers.insert(header::SET_COOKIE, HeaderValue::from_static("backend=1"));
    response
}

/// Mock service that waits `delay` before answering.
pub async fn spawn_slow(delay: Duration, recorder: Recorder) -> SocketAddr {
    spawn_mock(Router::new().fallback(move |request: Request<Body>| {
        let recorder = recorder.clone();
        async move {
            recorder.record(request).await;
            tokio::time::sleep(delay).await;
            "slow"
        }
    }))
    .await
}

/// Gateway config pointing at the given collaborators.
pub fn gateway_config(
    auth: SocketAddr,
    backend: SocketAddr,
    node: SocketAddr,
    monitoring: SocketAddr,
) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstreams.auth = format!("http://{}", auth);
    config.upstreams.backend = format!("http://{}", backend);
    config.upstreams.node = format!("http://{}", node);
    config.upstreams.monitoring = format!("http://{}", monitoring);
    config.cors.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
    config
}

/// Start the gateway on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let server = GatewayServer::new(config).expect("valid gateway config");
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Client without pooling or proxies, so each test sees fresh connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A full set of recording collaborators behind a running gateway.
pub struct Harness {
    pub gateway: SocketAddr,
    pub shutdown: Shutdown,
    pub auth: Recorder,
    pub backend: Recorder,
    pub node: Recorder,
    pub monitoring: Recorder,
}

impl Harness {
    pub async fn start() -> Self {
        let auth = Recorder::default();
        let backend = Recorder::default();
        let node = Recorder::default();
        let monitoring = Recorder::default();

        let config = gateway_config(
            spawn_auth(auth.clone()).await,
            spawn_echo("backend", backend.clone()).await,
            spawn_echo("node", node.clone()).await,
            spawn_echo("monitoring", monitoring.clone()).await,
        );
        let (gateway, shutdown) = spawn_gateway(config).await;

        Self {
            gateway,
            shutdown,
            auth,
            backend,
            node,
            monitoring,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.gateway, path)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
