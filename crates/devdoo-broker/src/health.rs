//! Structured health reporting for broker lifecycle and routing events.

use std::sync::Arc;

use devdoo_config::Config;

use crate::backends::BackendConnectError;
use crate::bootstrap::BootstrapError;
use crate::dispatch::ClientId;
use crate::queue::PendingRequest;
use crate::topology::{BrokerConfig, ServiceDescriptor};
use crate::transport::TransportError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface broker events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked once the broker is bound and ready to route.
    fn bootstrap_succeeded(&self, config: &Config, topology: &BrokerConfig);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the first connection to a backend endpoint is opened.
    fn backend_connecting(&self, service: &ServiceDescriptor);

    /// Invoked after a backend connection has been opened and cached.
    fn backend_connected(&self, service: &ServiceDescriptor);

    /// Invoked when a backend connection cannot be opened.
    fn backend_failed(&self, error: &BackendConnectError);

    /// Invoked when a request names a service this broker does not route.
    fn service_unresolved(&self, service_id: &str);

    /// Invoked when a request exchange with its backend fails.
    fn backend_exchange_failed(&self, service_id: &str, error: &TransportError);

    /// Invoked when a queued request passes its deadline.
    fn request_expired(&self, request: &PendingRequest);

    /// Invoked when a reply cannot be written to its client.
    fn reply_undeliverable(&self, client: ClientId, error: &TransportError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config, topology: &BrokerConfig) {
        (**self).bootstrap_succeeded(config, topology);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn backend_connecting(&self, service: &ServiceDescriptor) {
        (**self).backend_connecting(service);
    }

    fn backend_connected(&self, service: &ServiceDescriptor) {
        (**self).backend_connected(service);
    }

    fn backend_failed(&self, error: &BackendConnectError) {
        (**self).backend_failed(error);
    }

    fn service_unresolved(&self, service_id: &str) {
        (**self).service_unresolved(service_id);
    }

    fn backend_exchange_failed(&self, service_id: &str, error: &TransportError) {
        (**self).backend_exchange_failed(service_id, error);
    }

    fn request_expired(&self, request: &PendingRequest) {
        (**self).request_expired(request);
    }

    fn reply_undeliverable(&self, client: ClientId, error: &TransportError) {
        (**self).reply_undeliverable(client, error);
    }
}

/// Default reporter that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting broker bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config, topology: &BrokerConfig) {
        let role = topology.role();
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            broker = %topology.id(),
            kind = %topology.kind(),
            frontend = %topology.frontend(),
            services = topology.services().len(),
            bind_backend = role.bind_backend,
            connect_parent_backend = role.connect_parent_backend,
            connect_parent_frontend = role.connect_parent_frontend,
            request_ttl_ms = config.request_ttl_ms,
            log_format = ?config.log_format(),
            "broker ready"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "broker bootstrap failed"
        );
    }

    fn backend_connecting(&self, service: &ServiceDescriptor) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "backend_connecting",
            service = %service.id(),
            endpoint = %service.backend_endpoint(),
            "connecting to backend"
        );
    }

    fn backend_connected(&self, service: &ServiceDescriptor) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "backend_connected",
            service = %service.id(),
            endpoint = %service.backend_endpoint(),
            "backend connection cached"
        );
    }

    fn backend_failed(&self, error: &BackendConnectError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "backend_failed",
            service = %error.service_id(),
            endpoint = %error.endpoint(),
            message = %error.message(),
            error = ?error,
            "backend connection failed"
        );
    }

    fn service_unresolved(&self, service_id: &str) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "service_unresolved",
            service = %service_id,
            "request names an unconfigured service"
        );
    }

    fn backend_exchange_failed(&self, service_id: &str, error: &TransportError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "backend_exchange_failed",
            service = %service_id,
            error = %error,
            "backend exchange failed; connection evicted"
        );
    }

    fn request_expired(&self, request: &PendingRequest) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "request_expired",
            client = %request.client(),
            service = %request.service_id(),
            sequence = request.sequence(),
            "request expired before dispatch"
        );
    }

    fn reply_undeliverable(&self, client: ClientId, error: &TransportError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "reply_undeliverable",
            %client,
            error = %error,
            "discarding reply for unreachable client"
        );
    }
}
