//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → origin.rs (allow-list check, preflight short-circuit)
//!     → limits.rs (whole-request deadline, declared body size)
//!     → Pass to routing
//! Outgoing response:
//!     → origin.rs (CORS headers for allowed origins only)
//! ```
//!
//! # Design Decisions
//! - Declared oversize bodies are refused here; streamed ones are capped by
//!   `RequestBodyLimitLayer` and reported when read
//! - Session checks live in `auth`, per route, not here
//! - No trust in client input: origin must match exactly

pub mod limits;
pub mod origin;

pub use limits::{exceeds_body_limit, reject_oversized_body, request_deadline_error};
pub use origin::{origin_gate, OriginDecision, OriginPolicy};
