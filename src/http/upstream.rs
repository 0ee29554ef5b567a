//! Collaborator addressing.
//!
//! # Responsibilities
//! - Parse configured base URLs once at startup
//! - Build outbound URIs by combining a collaborator's scheme/authority with
//!   the (possibly rewritten) request path and query
//!
//! # Design Decisions
//! - Upstreams are resolved per `Target`, never from client input
//! - Base URLs carry no path; validation rejects them otherwise

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::Uri;
use std::str::FromStr;
use url::Url;

use crate::config::UpstreamConfig;
use crate::routing::Target;

/// Scheme and authority of a single collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    /// Parse a base URL such as `http://localhost:8000`.
    pub fn parse(base: &str) -> Result<Self, String> {
        let url = Url::parse(base).map_err(|e| format!("invalid upstream '{}': {}", base, e))?;
        let host = url
            .host_str()
            .ok_or_else(|| format!("upstream '{}' has no host", base))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: Scheme::from_str(url.scheme())
                .map_err(|e| format!("invalid scheme in '{}': {}", base, e))?,
            authority: Authority::from_str(&authority)
                .map_err(|e| format!("invalid authority in '{}': {}", base, e))?,
        })
    }

    /// Absolute URI for `path_and_query` on this collaborator.
    pub fn uri(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        let path_and_query = PathAndQuery::from_str(path_and_query)?;
        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?;
        Ok(uri)
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }
}

/// All collaborators, indexed by route target.
#[derive(Debug, Clone)]
pub struct Upstreams {
    auth: Upstream,
    backend: Upstream,
    node: Upstream,
    monitoring: Upstream,
}

impl Upstreams {
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, String> {
        Ok(Self {
            auth: Upstream::parse(&config.auth)?,
            backend: Upstream::parse(&config.backend)?,
            node: Upstream::parse(&config.node)?,
            monitoring: Upstream::parse(&config.monitoring)?,
        })
    }

    pub fn get(&self, target: Target) -> &Upstream {
        match target {
            Target::Auth => &self.auth,
            Target::Backend => &self.backend,
            Target::Node => &self.node,
            Target::Monitoring => &self.monitoring,
        }
    }
}
