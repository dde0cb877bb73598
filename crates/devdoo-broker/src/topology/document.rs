//! Serde model of the JSON topology document.

use std::collections::HashMap;

use serde::Deserialize;

use devdoo_config::SocketEndpoint;

use super::{BrokerConfig, BrokerKind, BrokerRole, ConfigError, ServiceDescriptor};

/// Top-level document: broker entries keyed by broker identifier.
#[derive(Debug, Deserialize)]
pub(super) struct TopologyDocument {
    pub(super) brokers: HashMap<String, BrokerEntry>,
}

/// One broker as written in the document.
#[derive(Debug, Deserialize)]
pub(super) struct BrokerEntry {
    network: NetworkEntry,
    #[serde(default)]
    services: Vec<ServiceEntry>,
    #[serde(default)]
    service_port: Option<u16>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    bind_backend: bool,
    #[serde(default)]
    connect_parent_backend: bool,
    #[serde(default)]
    connect_parent_frontend: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NetworkEntry {
    Tcp { ip: String, port: u16 },
    Unix { path: String },
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    id: String,
    address: String,
}

impl BrokerEntry {
    /// Converts the raw entry into a typed configuration.
    ///
    /// Only shape errors are reported here; service table rules belong to
    /// the service registry.
    pub(super) fn into_config(self, broker_id: &str) -> Result<BrokerConfig, ConfigError> {
        let kind = self
            .kind
            .parse::<BrokerKind>()
            .map_err(|value| ConfigError::InvalidBrokerType {
                broker_id: broker_id.to_owned(),
                value,
            })?;

        let frontend = match self.network {
            NetworkEntry::Tcp { ip, port } => SocketEndpoint::tcp(ip, port),
            NetworkEntry::Unix { path } => SocketEndpoint::unix(path),
        };

        let role = BrokerRole {
            bind_backend: self.bind_backend,
            connect_parent_backend: self.connect_parent_backend,
            connect_parent_frontend: self.connect_parent_frontend,
        };

        let mut config = BrokerConfig::new(broker_id, frontend, kind).with_role(role);
        if let Some(port) = self.service_port {
            config = config.with_service_port(port);
        }

        for service in self.services {
            let backend = service.address.parse::<SocketEndpoint>().map_err(|source| {
                ConfigError::InvalidAddress {
                    broker_id: broker_id.to_owned(),
                    subject: service.id.clone(),
                    source,
                }
            })?;
            config = config.with_service(ServiceDescriptor::new(service.id, backend));
        }

        Ok(config)
    }
}
