//! Broker topology: the frontend binding and child service table of a broker.
//!
//! Topology comes from an external Config Provider keyed by broker
//! identifier. The broker only consumes the result, so providers sit behind
//! the [`ConfigProvider`] trait. [`FileConfigProvider`] reads a JSON topology
//! document; [`StaticConfigProvider`] serves pre-built configurations.

mod document;
mod errors;
mod provider;

use std::fmt;
use std::str::FromStr;

use devdoo_config::SocketEndpoint;

pub use self::errors::ConfigError;
pub use self::provider::{ConfigProvider, FileConfigProvider, StaticConfigProvider};

/// Position of a broker within the broker hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerKind {
    /// Routes requests straight to worker services.
    Leaf,
    /// Fronts other brokers.
    Aggregator,
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Leaf => "leaf",
            Self::Aggregator => "aggregator",
        };
        formatter.write_str(label)
    }
}

impl FromStr for BrokerKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "leaf" => Ok(Self::Leaf),
            "aggregator" => Ok(Self::Aggregator),
            other => Err(other.to_owned()),
        }
    }
}

/// How a broker attaches to the rest of the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerRole {
    /// The broker binds a backend port that services connect to.
    pub bind_backend: bool,
    /// The broker connects to a parent broker as one of its backends.
    pub connect_parent_backend: bool,
    /// The broker connects to a parent broker as a frontend client.
    pub connect_parent_frontend: bool,
}

/// A backend worker service reachable at its own address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    id: String,
    backend: SocketEndpoint,
}

impl ServiceDescriptor {
    /// Describes the service `id` served at `backend`.
    #[must_use]
    pub fn new(id: impl Into<String>, backend: SocketEndpoint) -> Self {
        Self {
            id: id.into(),
            backend,
        }
    }

    /// Stable service identifier carried by client requests.
    #[must_use]
    pub const fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Address of the backend worker; also the connection cache key.
    #[must_use]
    pub const fn backend_endpoint(&self) -> &SocketEndpoint {
        &self.backend
    }
}

/// Immutable topology of one broker, fetched once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    id: String,
    frontend: SocketEndpoint,
    service_port: Option<u16>,
    kind: BrokerKind,
    role: BrokerRole,
    services: Vec<ServiceDescriptor>,
}

impl BrokerConfig {
    /// Builds a configuration with no services and the default role.
    #[must_use]
    pub fn new(id: impl Into<String>, frontend: SocketEndpoint, kind: BrokerKind) -> Self {
        Self {
            id: id.into(),
            frontend,
            service_port: None,
            kind,
            role: BrokerRole::default(),
            services: Vec::new(),
        }
    }

    /// Appends a child service.
    #[must_use]
    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    /// Sets the fixed service port.
    #[must_use]
    pub const fn with_service_port(mut self, port: u16) -> Self {
        self.service_port = Some(port);
        self
    }

    /// Replaces the hierarchy role flags.
    #[must_use]
    pub const fn with_role(mut self, role: BrokerRole) -> Self {
        self.role = role;
        self
    }

    /// Broker identifier.
    #[must_use]
    pub const fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Address the broker binds for inbound client traffic.
    #[must_use]
    pub const fn frontend(&self) -> &SocketEndpoint {
        &self.frontend
    }

    /// Fixed service port, when the broker exposes one.
    #[must_use]
    pub const fn service_port(&self) -> Option<u16> {
        self.service_port
    }

    /// Leaf or aggregator.
    #[must_use]
    pub const fn kind(&self) -> BrokerKind {
        self.kind
    }

    /// Hierarchy role flags.
    #[must_use]
    pub const fn role(&self) -> BrokerRole {
        self.role
    }

    /// Child services in declaration order.
    #[must_use]
    pub fn services(&self) -> &[ServiceDescriptor] {
        &self.services
    }
}
