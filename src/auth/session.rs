//! Session validation with one-shot refresh.
//!
//! # State Machine
//! ```text
//! (extract cookie) ──none──▶ NoSession                        → 401 unauthorized
//!        │
//!        ▼
//!   Validating ──transport error──▶ ServiceDown                → 503
//!        │ 200 ─────────────────▶ Valid
//!        │ other ───────────────▶ Rejected                     → 401 unauthorized
//!        │ 401
//!        ▼
//!   Refreshing ──200──▶ Valid (refresh Set-Cookies carried to the client)
//!        └── transport error / non-200 ──▶ StillUnauthorized   → 401 session expired
//! ```
//!
//! # Design Decisions
//! - A request is validated at most once and refreshed at most once
//! - After a successful refresh the current request proceeds with the
//!   original token; the new one takes effect on the client's next request
//! - Identity resolution is a separate call with its own deadline, attempted
//!   only after validation succeeded; every way it can fail, transport
//!   included, ends as 401 `failed to get user id`
//! - Nothing is cached between requests

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::client::AuthCollaborator;
use crate::auth::cookie;
use crate::error::GatewayError;
use crate::observability::metrics;

/// Field of the `/auth/me` reply holding the caller's identifier.
pub const IDENTITY_FIELD: &str = "uid";

/// Caller identifier resolved from a valid session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A session the auth service accepted for this request.
#[derive(Debug, Clone)]
pub struct ValidSession {
    /// The token as the client sent it.
    pub token: String,
    /// The session was accepted only after a refresh.
    pub refreshed: bool,
    /// `Set-Cookie` values from that refresh, in order.
    pub refreshed_cookies: Vec<HeaderValue>,
}

/// Terminal failure states of validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionFailure {
    #[error("no session cookie")]
    NoSession,

    #[error("auth service unreachable")]
    ServiceDown,

    #[error("session expired and refresh failed")]
    StillUnauthorized,

    #[error("session rejected with status {0}")]
    Rejected(StatusCode),
}

impl SessionFailure {
    fn outcome(&self) -> &'static str {
        match self {
            SessionFailure::NoSession => "no_session",
            SessionFailure::ServiceDown => "service_down",
            SessionFailure::StillUnauthorized => "expired",
            SessionFailure::Rejected(_) => "rejected",
        }
    }
}

impl From<SessionFailure> for GatewayError {
    fn from(failure: SessionFailure) -> Self {
        match failure {
            SessionFailure::NoSession | SessionFailure::Rejected(_) => GatewayError::Unauthorized,
            SessionFailure::ServiceDown => GatewayError::AuthServiceUnavailable,
            SessionFailure::StillUnauthorized => GatewayError::SessionExpired,
        }
    }
}

/// Failure to turn a session into an identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityFailure {
    #[error("auth service unreachable")]
    ServiceDown,

    #[error("identity lookup rejected with status {0}")]
    Rejected(StatusCode),

    #[error("identity reply has no usable uid field")]
    Malformed,
}

impl From<IdentityFailure> for GatewayError {
    fn from(failure: IdentityFailure) -> Self {
        match failure {
            IdentityFailure::ServiceDown
            | IdentityFailure::Rejected(_)
            | IdentityFailure::Malformed => GatewayError::IdentityUnavailable,
        }
    }
}

/// Runs the validate/refresh protocol against an auth collaborator.
pub struct SessionValidator<A> {
    auth: A,
}

impl<A: AuthCollaborator> SessionValidator<A> {
    pub fn new(auth: A) -> Self {
        Self { auth }
    }

    /// Validate the session carried by `headers`.
    pub async fn validate(
        &self,
        headers: &HeaderMap,
        request_id: Option<&HeaderValue>,
    ) -> Result<ValidSession, SessionFailure> {
        let result = self.run(headers, request_id).await;
        match &result {
            Ok(session) if session.refreshed => metrics::record_session_check("refreshed"),
            Ok(_) => metrics::record_session_check("valid"),
            Err(failure) => metrics::record_session_check(failure.outcome()),
        }
        result
    }

    async fn run(
        &self,
        headers: &HeaderMap,
        request_id: Option<&HeaderValue>,
    ) -> Result<ValidSession, SessionFailure> {
        let Some(token) = cookie::session_token(headers) else {
            tracing::debug!("No session cookie");
            return Err(SessionFailure::NoSession);
        };

        tracing::debug!(state = "validating", "Checking session");
        let reply = self
            .auth
            .who_am_i(&token, request_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Session check failed");
                SessionFailure::ServiceDown
            })?;

        match reply.status {
            StatusCode::OK => Ok(ValidSession {
                token,
                refreshed: false,
                refreshed_cookies: Vec::new(),
            }),
            StatusCode::UNAUTHORIZED => {
                let cookies = self.refresh(headers, &token, request_id).await?;
                Ok(ValidSession {
                    token,
                    refreshed: true,
                    refreshed_cookies: cookies,
                })
            }
            other => {
                tracing::warn!(status = %other, "Session rejected");
                Err(SessionFailure::Rejected(other))
            }
        }
    }

    async fn refresh(
        &self,
        headers: &HeaderMap,
        token: &str,
        request_id: Option<&HeaderValue>,
    ) -> Result<Vec<HeaderValue>, SessionFailure> {
        tracing::debug!(state = "refreshing", "Session expired, attempting refresh");

        let cookie_header = cookie::full_cookie_header(headers)
            .unwrap_or_else(|| format!("{}={}", cookie::SESSION_COOKIE, token));

        match self.auth.refresh(&cookie_header, request_id).await {
            Ok(reply) if reply.status == StatusCode::OK => {
                tracing::debug!(
                    cookies = reply.set_cookies.len(),
                    "Session refreshed"
                );
                Ok(reply.set_cookies)
            }
            Ok(reply) => {
                tracing::warn!(status = %reply.status, "Refresh rejected");
                Err(SessionFailure::StillUnauthorized)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Refresh call failed");
                Err(SessionFailure::StillUnauthorized)
            }
        }
    }

    /// Ask the auth service who owns `token`.
    pub async fn resolve_identity(
        &self,
        token: &str,
        request_id: Option<&HeaderValue>,
    ) -> Result<Identity, IdentityFailure> {
        let reply = self.auth.who_am_i(token, request_id).await.map_err(|e| {
            tracing::error!(error = %e, "Identity lookup failed");
            IdentityFailure::ServiceDown
        })?;

        if reply.status != StatusCode::OK {
            tracing::warn!(status = %reply.status, "Identity lookup rejected");
            return Err(IdentityFailure::Rejected(reply.status));
        }

        let fields: Map<String, Value> =
            serde_json::from_slice(&reply.body).map_err(|_| IdentityFailure::Malformed)?;

        match fields.get(IDENTITY_FIELD) {
            Some(Value::String(uid)) if !uid.is_empty() => Ok(Identity::new(uid.clone())),
            _ => Err(IdentityFailure::Malformed),
        }
    }
}
