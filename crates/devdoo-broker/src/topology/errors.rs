//! Startup-fatal topology errors.

use std::io;
use std::path::PathBuf;

use devdoo_config::SocketParseError;
use thiserror::Error;

/// Errors raised while fetching or validating a broker's topology.
///
/// Every variant is fatal: the broker refuses to start rather than run with a
/// partial service table.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The topology document could not be read.
    #[error("failed to read topology document '{path}': {source}")]
    Read {
        /// Document path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The topology document is not valid JSON or does not match the schema.
    #[error("failed to parse topology document '{path}': {source}")]
    Parse {
        /// Document path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The provider has no entry for the requested broker.
    #[error("no topology configured for broker '{broker_id}'")]
    UnknownBroker {
        /// Requested broker id.
        broker_id: String,
    },
    /// The broker `type` field is neither `leaf` nor `aggregator`.
    #[error("broker '{broker_id}' has unsupported type '{value}'")]
    InvalidBrokerType {
        /// Broker declaring the type.
        broker_id: String,
        /// Rejected value.
        value: String,
    },
    /// A frontend or service address failed to parse.
    #[error("broker '{broker_id}' has an invalid address for '{subject}': {source}")]
    InvalidAddress {
        /// Broker declaring the address.
        broker_id: String,
        /// `frontend` or the id of the service owning the address.
        subject: String,
        /// Parse failure.
        #[source]
        source: SocketParseError,
    },
    /// A service entry has an empty identifier.
    #[error("broker '{broker_id}' declares a service with an empty id")]
    EmptyServiceId {
        /// Broker declaring the service.
        broker_id: String,
    },
    /// Two service entries share one identifier.
    #[error("broker '{broker_id}' declares service '{service_id}' more than once")]
    DuplicateService {
        /// Broker declaring the services.
        broker_id: String,
        /// Repeated id.
        service_id: String,
    },
    /// The broker has neither child services nor a fixed service port.
    #[error("broker '{broker_id}' has no services and no service port")]
    NoServices {
        /// Broker without services.
        broker_id: String,
    },
}

impl ConfigError {
    /// Creates an unknown broker error.
    #[must_use]
    pub fn unknown_broker(broker_id: impl Into<String>) -> Self {
        Self::UnknownBroker {
            broker_id: broker_id.into(),
        }
    }
}
