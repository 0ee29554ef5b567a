//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch pipeline)
//!     → request.rs (request ID assigned and propagated)
//!     → [routing decides target, auth validates session]
//!     → transform.rs (path rewrite, identity injection)
//!     → proxy.rs / monitoring.rs (collaborator call via upstream.rs)
//!     → Send to client
//! ```

pub mod monitoring;
pub mod proxy;
pub mod request;
pub mod server;
pub mod transform;
pub mod upstream;

pub use monitoring::MonitoringRelay;
pub use proxy::ForwardingProxy;
pub use request::{MakeGatewayRequestId, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
pub use upstream::{Upstream, Upstreams};
