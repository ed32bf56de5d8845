//! Namespace negotiation.
//!
//! A [`NamespaceNegotiator`] decides which configuration namespace serves a
//! request, usually from its host.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::HOST;
use parking_lot::RwLock;
use thiserror::Error;

use crate::types::Request;

/// Negotiation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    /// The request carries no host.
    #[error("request has no host")]
    MissingHost,

    /// No namespace is known for the host.
    #[error("host not found: {host}")]
    HostNotFound {
        /// The host that was looked up, empty when unknown.
        host: String,
    },
}

/// Selects the configuration namespace of a request.
pub trait NamespaceNegotiator: Send + Sync {
    /// Returns the namespace for `request`.
    fn negotiate(&self, request: &Request) -> Result<String, NegotiationError>;
}

/// Host of a request: the `Host` header, then the URI authority.
pub fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().authority().map(|authority| authority.as_str()))
        .filter(|host| !host.is_empty())
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // [v6]:port
        return rest.split_once(']').map_or(host, |(addr, _)| addr);
    }
    host.split(':').next().unwrap_or(host)
}

/// Uses the host itself as the namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostNegotiator {
    /// Drop the `:port` suffix.
    pub skip_port: bool,
}

impl HostNegotiator {
    /// Negotiator that keeps the port.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Negotiator that drops the port.
    #[must_use]
    pub fn skip_port() -> Self {
        Self { skip_port: true }
    }
}

impl NamespaceNegotiator for HostNegotiator {
    fn negotiate(&self, request: &Request) -> Result<String, NegotiationError> {
        let host = request_host(request).ok_or(NegotiationError::MissingHost)?;
        let host = if self.skip_port { strip_port(host) } else { host };
        Ok(host.to_string())
    }
}

/// Maps hosts to namespaces through an explicit table.
#[derive(Debug, Default)]
pub struct HostMapNegotiator {
    hosts: RwLock<HashMap<String, String>>,
}

impl HostMapNegotiator {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping, builder style.
    #[must_use]
    pub fn with(self, host: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.add(host, namespace);
        self
    }

    /// Maps `host` to `namespace`, replacing any previous mapping.
    pub fn add(&self, host: impl Into<String>, namespace: impl Into<String>) {
        self.hosts.write().insert(host.into(), namespace.into());
    }

    /// Removes the mapping of `host`.
    pub fn remove(&self, host: &str) {
        self.hosts.write().remove(host);
    }
}

impl NamespaceNegotiator for HostMapNegotiator {
    fn negotiate(&self, request: &Request) -> Result<String, NegotiationError> {
        let host = request_host(request).ok_or(NegotiationError::MissingHost)?;
        self.hosts
            .read()
            .get(host)
            .cloned()
            .ok_or_else(|| NegotiationError::HostNotFound {
                host: host.to_string(),
            })
    }
}

/// Tries negotiators in order and returns the first success.
#[derive(Default)]
pub struct ChainedNegotiator {
    negotiators: Vec<Arc<dyn NamespaceNegotiator>>,
}

impl ChainedNegotiator {
    /// Creates an empty chain, which fails every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a negotiator, builder style.
    #[must_use]
    pub fn with(mut self, negotiator: impl NamespaceNegotiator + 'static) -> Self {
        self.add(Arc::new(negotiator));
        self
    }

    /// Appends a negotiator.
    pub fn add(&mut self, negotiator: Arc<dyn NamespaceNegotiator>) {
        self.negotiators.push(negotiator);
    }
}

impl NamespaceNegotiator for ChainedNegotiator {
    fn negotiate(&self, request: &Request) -> Result<String, NegotiationError> {
        self.negotiators
            .iter()
            .find_map(|negotiator| negotiator.negotiate(request).ok())
            .ok_or_else(|| NegotiationError::HostNotFound {
                host: request_host(request).unwrap_or_default().to_string(),
            })
    }
}
