//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check upstream URLs are usable by the plain-HTTP client
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject origin entries the gate cannot honour
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let upstreams = [
        ("upstreams.auth", &config.upstreams.auth),
        ("upstreams.backend", &config.upstreams.backend),
        ("upstreams.node", &config.upstreams.node),
        ("upstreams.monitoring", &config.upstreams.monitoring),
    ];
    for (field, raw) in upstreams {
        if let Err(message) = check_upstream_url(raw) {
            errors.push(ValidationError::new(field, message));
        }
    }

    if config.cors.allowed_origins.is_empty() {
        errors.push(ValidationError::new(
            "cors.allowed_origins",
            "at least one origin is required",
        ));
    }
    for origin in &config.cors.allowed_origins {
        if origin == "*" {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                "wildcard origin cannot be combined with credentials",
            ));
        } else if origin.trim().is_empty() || origin.ends_with('/') {
            errors.push(ValidationError::new(
                "cors.allowed_origins",
                format!("'{}' is not an origin", origin),
            ));
        }
    }

    let timeouts = [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.forward_secs", config.timeouts.forward_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_body_bytes",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a URL: {}", raw, e))?;

    if url.scheme() != "http" {
        return Err(format!("scheme '{}' is not supported, use http", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    if url.path() != "/" || url.query().is_some() {
        return Err(format!("'{}' must not carry a path or query", raw));
    }
    Ok(())
}
