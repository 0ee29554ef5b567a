//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate path and method conditions)
//!     → Return: matched Route or NoMatch
//!
//! Route Compilation (at startup):
//!     Route[]
//!     → Sort by specificity (exact > template > prefix, longer first)
//!     → Freeze as immutable RouteTable shared via Arc
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - A route carries its target, auth requirement and transform, so the
//!   handler never branches on paths itself

pub mod matcher;
pub mod router;

pub use matcher::{MethodSet, PathMatcher};
pub use router::{carries_body, NoMatch, Route, RouteTable, Target, Transform};
