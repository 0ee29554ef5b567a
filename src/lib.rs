//! Auth-aware API gateway library.
//!
//! Presents the auth, tenant, node and monitoring services as one origin:
//! every request passes the origin gate, is routed, has its session checked
//! where the route requires it, is rewritten for its target and forwarded.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
