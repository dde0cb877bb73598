//! Resolution of service ids to backend connections.

use std::sync::Arc;

use thiserror::Error;

use crate::backends::{BackendConnectError, BackendConnector, ConnectionCache};
use crate::health::HealthReporter;
use crate::queue::PendingRequest;
use crate::registry::ServiceRegistry;

/// Reasons a request cannot be routed.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No service with this id is configured on the broker.
    #[error("service '{service_id}' is not configured on this broker")]
    ServiceNotConfigured {
        /// Requested service id.
        service_id: String,
    },
    /// The service is configured but its backend cannot be reached.
    #[error("service '{service_id}' is unavailable: {source}")]
    ServiceUnavailable {
        /// Requested service id.
        service_id: String,
        /// Connect failure.
        #[source]
        source: Box<BackendConnectError>,
    },
}

impl RoutingError {
    /// Creates the error for an id missing from the registry.
    #[must_use]
    pub fn not_configured(service_id: impl Into<String>) -> Self {
        Self::ServiceNotConfigured {
            service_id: service_id.into(),
        }
    }

    /// Wraps a connection failure for the service it was opened for.
    #[must_use]
    pub fn unavailable(error: BackendConnectError) -> Self {
        Self::ServiceUnavailable {
            service_id: error.service_id().to_owned(),
            source: Box::new(error),
        }
    }

    /// Wire `kind` string of the error reply.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ServiceNotConfigured { .. } => "ServiceNotConfigured",
            Self::ServiceUnavailable { .. } => "ServiceUnavailable",
        }
    }
}

/// Facade combining the service registry with the connection cache.
pub struct Broker<C>
where
    C: BackendConnector,
{
    registry: ServiceRegistry,
    cache: ConnectionCache<C>,
    reporter: Arc<dyn HealthReporter>,
}

impl<C> std::fmt::Debug for Broker<C>
where
    C: BackendConnector,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<C> Broker<C>
where
    C: BackendConnector,
{
    /// Builds a broker over `registry` that opens connections with
    /// `connector`.
    #[must_use]
    pub fn new(
        registry: ServiceRegistry,
        connector: C,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            registry,
            cache: ConnectionCache::new(connector),
            reporter,
        }
    }

    /// Services this broker routes to.
    #[must_use]
    pub const fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Open backend connections.
    #[must_use]
    pub const fn cache(&self) -> &ConnectionCache<C> {
        &self.cache
    }

    /// Resolves the backend connection for a queued request.
    ///
    /// # Errors
    ///
    /// See [`Broker::resolve_service`].
    pub fn resolve(&mut self, request: &PendingRequest) -> Result<&mut C::Channel, RoutingError> {
        self.resolve_service(request.service_id())
    }

    /// Resolves `service_id` to an open backend connection.
    ///
    /// The first resolution for an endpoint opens the connection; later ones
    /// reuse it.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::ServiceNotConfigured`] for unknown ids and
    /// [`RoutingError::ServiceUnavailable`] when the backend cannot be
    /// reached.
    pub fn resolve_service(&mut self, service_id: &str) -> Result<&mut C::Channel, RoutingError> {
        let Some(service) = self.registry.find(service_id) else {
            self.reporter.service_unresolved(service_id);
            return Err(RoutingError::not_configured(service_id));
        };
        let fresh = !self.cache.contains(service.backend_endpoint());
        if fresh {
            self.reporter.backend_connecting(service);
        }
        let channel = self.cache.get_or_create(service).map_err(|error| {
            self.reporter.backend_failed(&error);
            RoutingError::unavailable(error)
        })?;
        if fresh {
            self.reporter.backend_connected(service);
        }
        Ok(channel)
    }

    /// Evicts the cached connection serving `service_id`.
    ///
    /// Returns whether a connection was dropped.
    pub fn discard_connection(&mut self, service_id: &str) -> bool {
        self.registry
            .find(service_id)
            .is_some_and(|service| self.cache.evict(service.backend_endpoint()))
    }
}
