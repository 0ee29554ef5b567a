//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Routes sorted by specificity once, so lookup is first-hit
//! - O(n) scan (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use axum::http::Method;

use crate::routing::matcher::{MethodSet, PathMatcher};

/// Collaborator a route forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Auth,
    Backend,
    Node,
    Monitoring,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Auth => "auth",
            Target::Backend => "backend",
            Target::Node => "node",
            Target::Monitoring => "monitoring",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rewrite applied to a request before it is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    None,
    /// Replace `from` at the start of the path with `to`.
    RewritePrefix { from: String, to: String },
    /// Assert the caller's identity: body-carrying methods get `field` set in
    /// their JSON object; GET is redirected to `scoped_path` with
    /// `{identity}` substituted.
    InjectIdentity {
        field: String,
        scoped_path: Option<String>,
    },
}

impl Transform {
    /// Whether applying this transform to `method` needs a resolved identity.
    pub fn needs_identity(&self, method: &Method) -> bool {
        match self {
            Transform::InjectIdentity { scoped_path, .. } => {
                if method == Method::GET {
                    scoped_path.is_some()
                } else {
                    carries_body(method)
                }
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::None => write!(f, "-"),
            Transform::RewritePrefix { from, to } => write!(f, "rewrite {} -> {}", from, to),
            Transform::InjectIdentity { field, scoped_path } => match scoped_path {
                Some(path) => write!(f, "inject {} (GET -> {})", field, path),
                None => write!(f, "inject {}", field),
            },
        }
    }
}

/// Methods whose requests carry a JSON body for identity injection.
pub fn carries_body(method: &Method) -> bool {
    method == Method::POST || method == Method::PUT || method == Method::PATCH
}

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Route identifier for logging/metrics.
    pub name: &'static str,
    pub path: PathMatcher,
    pub methods: MethodSet,
    pub target: Target,
    pub requires_auth: bool,
    pub transform: Transform,
}

/// Why no route was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatch {
    /// No route covers the path.
    Path,
    /// Some route covers the path, none accepts the method.
    Method,
}

/// Immutable, specificity-ordered route table.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Compile routes, most specific first. Ties keep declaration order.
    pub fn new(mut routes: Vec<Route>) -> Self {
        routes.sort_by(|a, b| b.path.specificity().cmp(&a.path.specificity()));
        Self { routes }
    }

    /// Find the most specific route whose path matches and whose method set
    /// includes `method`.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<&Route, NoMatch> {
        let mut path_matched = false;
        for route in &self.routes {
            if !route.path.matches(path) {
                continue;
            }
            if route.methods.allows(method) {
                return Ok(route);
            }
            path_matched = true;
        }

        if path_matched {
            Err(NoMatch::Method)
        } else {
            Err(NoMatch::Path)
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The gateway's public surface.
    pub fn gateway_default() -> Self {
        use Method as M;

        Self::new(vec![
            Route {
                name: "auth",
                path: PathMatcher::prefix("/auth"),
                methods: MethodSet::Any,
                target: Target::Auth,
                requires_auth: false,
                transform: Transform::None,
            },
            Route {
                name: "tenants",
                path: PathMatcher::exact("/api/tenants"),
                methods: MethodSet::only(&[M::GET, M::POST, M::OPTIONS]),
                target: Target::Backend,
                requires_auth: true,
                transform: Transform::InjectIdentity {
                    field: "firebase_uid".to_string(),
                    scoped_path: Some("/api/user/{identity}/tenants".to_string()),
                },
            },
            Route {
                name: "tenant",
                path: PathMatcher::template("/api/tenants/{id}"),
                methods: MethodSet::only(&[M::GET, M::PUT, M::DELETE, M::OPTIONS]),
                target: Target::Backend,
                requires_auth: true,
                transform: Transform::None,
            },
            Route {
                name: "apikeys",
                path: PathMatcher::prefix("/api/apikeys"),
                methods: MethodSet::only(&[M::GET, M::POST, M::DELETE, M::OPTIONS]),
                target: Target::Backend,
                requires_auth: true,
                transform: Transform::None,
            },
            Route {
                name: "nodes",
                path: PathMatcher::prefix("/api/nodes"),
                methods: MethodSet::only(&[M::GET, M::POST, M::DELETE, M::OPTIONS]),
                target: Target::Node,
                requires_auth: true,
                transform: Transform::RewritePrefix {
                    from: "/api/nodes".to_string(),
                    to: "/node".to_string(),
                },
            },
            Route {
                name: "monitoring_nodes",
                path: PathMatcher::exact("/api/monitoring/nodes"),
                methods: MethodSet::only(&[M::GET, M::OPTIONS]),
                target: Target::Monitoring,
                requires_auth: false,
                transform: Transform::RewritePrefix {
                    from: "/api/monitoring".to_string(),
                    to: "/monitoring".to_string(),
                },
            },
            Route {
                name: "monitoring_redis",
                path: PathMatcher::template("/api/monitoring/redis/{id}"),
                methods: MethodSet::only(&[M::GET, M::OPTIONS]),
                target: Target::Monitoring,
                requires_auth: false,
                transform: Transform::RewritePrefix {
                    from: "/api/monitoring".to_string(),
                    to: "/monitoring".to_string(),
                },
            },
        ])
    }
}
