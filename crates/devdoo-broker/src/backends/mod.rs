//! Backend connections and the per-endpoint connection cache.
//!
//! The broker keeps at most one open connection per backend endpoint. A
//! connection is opened the first time any service on that endpoint is
//! resolved and reused for every later request, whichever service id named
//! it. Connections that fail mid-exchange are evicted so the next request
//! reconnects.

mod socket;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use thiserror::Error;

use devdoo_config::SocketEndpoint;

use crate::topology::ServiceDescriptor;
use crate::transport::TransportError;

pub use self::socket::{SocketBackend, SocketConnector};

/// Errors surfaced when a backend connection cannot be opened.
#[derive(Debug, Error)]
#[error("backend {endpoint} for service '{service_id}' is unreachable: {message}")]
pub struct BackendConnectError {
    service_id: String,
    endpoint: SocketEndpoint,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendConnectError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(service: &ServiceDescriptor, message: impl Into<String>) -> Self {
        Self {
            service_id: service.id().to_owned(),
            endpoint: service.backend_endpoint().clone(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source.
    #[must_use]
    pub fn with_source(
        service: &ServiceDescriptor,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(service, message)
        }
    }

    /// Service whose backend could not be reached.
    #[must_use]
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Endpoint the connect attempt targeted.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Short description of the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Open request/reply channel to one backend endpoint.
pub trait BackendChannel {
    /// Sends one request frame.
    fn send(&mut self, request: &[u8]) -> Result<(), TransportError>;

    /// Receives the next reply frame.
    fn receive(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Sends `request` and waits for its reply.
    fn round_trip(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.send(request)?;
        self.receive()
    }
}

/// Opens backend channels.
pub trait BackendConnector {
    /// Channel type produced by this connector.
    type Channel: BackendChannel;

    /// Opens a usable connection to the backend serving `service`.
    fn connect(&self, service: &ServiceDescriptor) -> Result<Self::Channel, BackendConnectError>;
}

/// Open backend connections keyed by endpoint.
pub struct ConnectionCache<C>
where
    C: BackendConnector,
{
    connector: C,
    connections: HashMap<SocketEndpoint, C::Channel>,
}

impl<C> fmt::Debug for ConnectionCache<C>
where
    C: BackendConnector,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("endpoints", &self.connections.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<C> ConnectionCache<C>
where
    C: BackendConnector,
{
    /// Builds an empty cache over `connector`.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            connections: HashMap::new(),
        }
    }

    /// Returns the cached connection for the service's endpoint, opening one
    /// on a miss.
    ///
    /// A failed connect leaves the cache unchanged, so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns the connector's error when a new connection cannot be opened.
    pub fn get_or_create(
        &mut self,
        service: &ServiceDescriptor,
    ) -> Result<&mut C::Channel, BackendConnectError> {
        match self.connections.entry(service.backend_endpoint().clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let channel = self.connector.connect(service)?;
                Ok(entry.insert(channel))
            }
        }
    }

    /// Drops the connection to `endpoint`. Returns whether one was cached.
    pub fn evict(&mut self, endpoint: &SocketEndpoint) -> bool {
        self.connections.remove(endpoint).is_some()
    }

    /// Whether a connection to `endpoint` is cached.
    #[must_use]
    pub fn contains(&self, endpoint: &SocketEndpoint) -> bool {
        self.connections.contains_key(endpoint)
    }

    /// Number of cached connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connector used to open new channels.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }
}
