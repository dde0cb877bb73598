//! [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use devdoo_config::Config;

use crate::backends::BackendConnectError;
use crate::bootstrap::BootstrapError;
use crate::dispatch::ClientId;
use crate::health::HealthReporter;
use crate::queue::PendingRequest;
use crate::topology::{BrokerConfig, ServiceDescriptor};
use crate::transport::TransportError;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded { broker: String },
    BootstrapFailed(String),
    BackendConnecting(String),
    BackendConnected(String),
    BackendFailed(String),
    ServiceUnresolved(String),
    BackendExchangeFailed(String),
    RequestExpired(String),
    ReplyUndeliverable(u64),
}

#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config, topology: &BrokerConfig) {
        self.record(HealthEvent::BootstrapSucceeded {
            broker: topology.id().to_owned(),
        });
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn backend_connecting(&self, service: &ServiceDescriptor) {
        self.record(HealthEvent::BackendConnecting(service.id().to_owned()));
    }

    fn backend_connected(&self, service: &ServiceDescriptor) {
        self.record(HealthEvent::BackendConnected(service.id().to_owned()));
    }

    fn backend_failed(&self, error: &BackendConnectError) {
        self.record(HealthEvent::BackendFailed(error.service_id().to_owned()));
    }

    fn service_unresolved(&self, service_id: &str) {
        self.record(HealthEvent::ServiceUnresolved(service_id.to_owned()));
    }

    fn backend_exchange_failed(&self, service_id: &str, _error: &TransportError) {
        self.record(HealthEvent::BackendExchangeFailed(service_id.to_owned()));
    }

    fn request_expired(&self, request: &PendingRequest) {
        self.record(HealthEvent::RequestExpired(request.service_id().to_owned()));
    }

    fn reply_undeliverable(&self, client: ClientId, _error: &TransportError) {
        self.record(HealthEvent::ReplyUndeliverable(client.get()));
    }
}
