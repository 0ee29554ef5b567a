//! Path and method matching.
//!
//! # Responsibilities
//! - Match a request path against an exact path, a segment template, or a prefix
//! - Rank matchers so the most specific one is tried first
//! - Match the request method against a route's allowed set
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefix matching is a plain string prefix (`/api/apikeys` also covers
//!   `/api/apikeys/abc` and `/api/apikeysX`)
//! - Template parameters match exactly one non-empty segment
//! - No regex to guarantee O(n) matching

use axum::http::Method;

/// One piece of a segment template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param,
}

/// How a route's path is compared against the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    /// Whole path must be equal.
    Exact(String),
    /// Same number of segments; `{name}` segments match any non-empty value.
    Template {
        pattern: String,
        segments: Vec<Segment>,
    },
    /// Path must start with the prefix.
    Prefix(String),
}

impl PathMatcher {
    pub fn exact(path: impl Into<String>) -> Self {
        PathMatcher::Exact(path.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        PathMatcher::Prefix(prefix.into())
    }

    /// Build a template such as `/api/tenants/{id}`.
    pub fn template(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let segments = pattern
            .split('/')
            .map(|s| {
                if s.starts_with('{') && s.ends_with('}') && s.len() > 2 {
                    Segment::Param
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        PathMatcher::Template { pattern, segments }
    }

    /// Returns true if the path satisfies this matcher.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Exact(expected) => path == expected,
            PathMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
            PathMatcher::Template { segments, .. } => {
                let mut parts = path.split('/');
                for segment in segments {
                    match (segment, parts.next()) {
                        (Segment::Literal(lit), Some(part)) if lit == part => {}
                        (Segment::Param, Some(part)) if !part.is_empty() => {}
                        _ => return false,
                    }
                }
                parts.next().is_none()
            }
        }
    }

    /// Ordering key: exact beats template beats prefix; longer beats shorter.
    pub fn specificity(&self) -> (u8, usize) {
        match self {
            PathMatcher::Exact(p) => (2, p.len()),
            PathMatcher::Template { pattern, .. } => (1, pattern.len()),
            PathMatcher::Prefix(p) => (0, p.len()),
        }
    }

    /// The literal text this matcher was built from.
    pub fn pattern(&self) -> &str {
        match self {
            PathMatcher::Exact(p) | PathMatcher::Prefix(p) => p,
            PathMatcher::Template { pattern, .. } => pattern,
        }
    }
}

impl std::fmt::Display for PathMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathMatcher::Prefix(p) => write!(f, "{}*", p),
            other => write!(f, "{}", other.pattern()),
        }
    }
}

/// Set of methods a route accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSet {
    Any,
    Only(Vec<Method>),
}

impl MethodSet {
    pub fn only(methods: &[Method]) -> Self {
        MethodSet::Only(methods.to_vec())
    }

    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Only(methods) => methods.contains(method),
        }
    }
}

impl std::fmt::Display for MethodSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodSet::Any => write!(f, "ANY"),
            MethodSet::Only(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                write!(f, "{}", names.join(","))
            }
        }
    }
}
