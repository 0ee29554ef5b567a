//! Authentication collaborator client.
//!
//! # Responsibilities
//! - Ask the auth service who owns a session (`GET /auth/me`)
//! - Ask the auth service to mint a new session (`POST /auth/refresh`)
//! - Bound every call by a fixed deadline
//!
//! # Design Decisions
//! - Calls return the raw reply (status, `Set-Cookie`s, body); deciding what a
//!   status means belongs to the session validator
//! - Transport failures and deadline expiry are distinct errors, both of
//!   which the validator treats as the service being down
//! - Shares the gateway's pooled HTTP client

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::http::request::X_REQUEST_ID;
use crate::http::upstream::Upstream;

pub const ME_PATH: &str = "/auth/me";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Replies larger than this are treated as transport failures.
const MAX_REPLY_BYTES: usize = 64 * 1024;

/// What the auth service answered.
#[derive(Debug, Clone)]
pub struct AuthReply {
    pub status: StatusCode,
    /// Every `Set-Cookie` header, in order.
    pub set_cookies: Vec<HeaderValue>,
    pub body: Bytes,
}

impl AuthReply {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            set_cookies: Vec::new(),
            body: Bytes::new(),
        }
    }
}

/// Failure to obtain any reply from the auth service.
#[derive(Debug, Error)]
pub enum AuthCallError {
    #[error("auth call timed out after {0:?}")]
    Timeout(Duration),

    #[error("auth transport error: {0}")]
    Transport(String),

    #[error("auth reply unreadable: {0}")]
    Body(String),
}

/// The calls the session protocol makes against the auth service.
pub trait AuthCollaborator: Send + Sync {
    /// `GET /auth/me` with only the session cookie.
    fn who_am_i(
        &self,
        session_token: &str,
        request_id: Option<&HeaderValue>,
    ) -> impl Future<Output = Result<AuthReply, AuthCallError>> + Send;

    /// `POST /auth/refresh` with the caller's complete cookie header.
    fn refresh(
        &self,
        cookie_header: &str,
        request_id: Option<&HeaderValue>,
    ) -> impl Future<Output = Result<AuthReply, AuthCallError>> + Send;
}

/// HTTP implementation backed by the shared hyper client.
#[derive(Clone)]
pub struct HttpAuthClient {
    client: Client<HttpConnector, Body>,
    upstream: Upstream,
    timeout: Duration,
}

impl HttpAuthClient {
    pub fn new(client: Client<HttpConnector, Body>, upstream: Upstream, timeout: Duration) -> Self {
        Self {
            client,
            upstream,
            timeout,
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        cookie: &str,
        request_id: Option<&HeaderValue>,
    ) -> Result<AuthReply, AuthCallError> {
        let uri = self
            .upstream
            .uri(path)
            .map_err(|e| AuthCallError::Transport(e.to_string()))?;
        let cookie =
            HeaderValue::from_str(cookie).map_err(|e| AuthCallError::Transport(e.to_string()))?;

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie);
        if let Some(id) = request_id {
            builder = builder.header(X_REQUEST_ID, id.clone());
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| AuthCallError::Transport(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| AuthCallError::Transport(e.to_string()))?;

            let (parts, body) = response.into_parts();
            let body = axum::body::to_bytes(Body::new(body), MAX_REPLY_BYTES)
                .await
                .map_err(|e| AuthCallError::Body(e.to_string()))?;

            Ok::<_, AuthCallError>(AuthReply {
                status: parts.status,
                set_cookies: parts
                    .headers
                    .get_all(header::SET_COOKIE)
                    .iter()
                    .cloned()
                    .collect(),
                body,
            })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| AuthCallError::Timeout(self.timeout))?
    }
}

impl AuthCollaborator for HttpAuthClient {
    async fn who_am_i(
        &self,
        session_token: &str,
        request_id: Option<&HeaderValue>,
    ) -> Result<AuthReply, AuthCallError> {
        let cookie = format!("{}={}", super::cookie::SESSION_COOKIE, session_token);
        self.call(Method::GET, ME_PATH, &cookie, request_id).await
    }

    async fn refresh(
        &self,
        cookie_header: &str,
        request_id: Option<&HeaderValue>,
    ) -> Result<AuthReply, AuthCallError> {
        self.call(Method::POST, REFRESH_PATH, cookie_header, request_id)
            .await
    }
}
