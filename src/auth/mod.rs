//! Session authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Request headers
//!     → cookie.rs (extract session_token / full cookie header)
//!     → session.rs (validate, refresh once, resolve identity)
//!     → client.rs (HTTP calls to the auth service, 5s deadline each)
//!     → Return: ValidSession + optional Identity, or a typed failure
//! ```
//!
//! # Design Decisions
//! - The gateway never decodes the session token; the auth service owns it
//! - No authentication decision outlives the request that produced it
//! - The collaborator sits behind a trait so the protocol is testable in
//!   isolation from HTTP

pub mod client;
pub mod cookie;
pub mod session;

use std::time::Duration;

pub use client::{AuthCallError, AuthCollaborator, AuthReply, HttpAuthClient};
pub use session::{Identity, IdentityFailure, SessionFailure, SessionValidator, ValidSession};

/// Deadline for each call to the auth service.
pub const AUTH_CALL_TIMEOUT: Duration = Duration::from_secs(5);
