//! In-memory table of the services a broker can route to.

use std::collections::HashMap;

use crate::topology::{BrokerConfig, ConfigError, ServiceDescriptor};

/// Lookup table from service identifier to backend descriptor.
///
/// Built once from the broker topology and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceDescriptor>,
}

impl ServiceRegistry {
    /// Builds the registry for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a service id is empty or repeated, or when
    /// the broker has no services and no fixed service port.
    pub fn from_config(config: &BrokerConfig) -> Result<Self, ConfigError> {
        if config.services().is_empty() && config.service_port().is_none() {
            return Err(ConfigError::NoServices {
                broker_id: config.id().to_owned(),
            });
        }

        let mut services = HashMap::with_capacity(config.services().len());
        for service in config.services() {
            let id = service.id().trim();
            if id.is_empty() {
                return Err(ConfigError::EmptyServiceId {
                    broker_id: config.id().to_owned(),
                });
            }
            if services.insert(id.to_owned(), service.clone()).is_some() {
                return Err(ConfigError::DuplicateService {
                    broker_id: config.id().to_owned(),
                    service_id: id.to_owned(),
                });
            }
        }

        Ok(Self { services })
    }

    /// Looks up a service by identifier.
    ///
    /// Absence is an ordinary outcome: callers turn it into a per-request
    /// error instead of failing the loop.
    #[must_use]
    pub fn find(&self, service_id: &str) -> Option<&ServiceDescriptor> {
        self.services.get(service_id.trim())
    }

    /// Number of configured services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` when no services are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use devdoo_config::SocketEndpoint;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::topology::BrokerKind;

    #[fixture]
    fn broker() -> BrokerConfig {
        BrokerConfig::new("b1", SocketEndpoint::tcp("127.0.0.1", 7000), BrokerKind::Leaf)
    }

    fn service(id: &str, port: u16) -> ServiceDescriptor {
        ServiceDescriptor::new(id, SocketEndpoint::tcp("127.0.0.1", port))
    }

    #[rstest]
    fn finds_configured_services(broker: BrokerConfig) {
        let registry = ServiceRegistry::from_config(
            &broker
                .with_service(service("users", 7101))
                .with_service(service("orders", 7102)),
        )
        .expect("registry builds");

        let found = registry.find("orders").expect("orders is configured");
        assert_eq!(found.backend_endpoint(), &SocketEndpoint::tcp("127.0.0.1", 7102));
        assert!(registry.find("billing").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[rstest]
    fn rejects_empty_table_without_service_port(broker: BrokerConfig) {
        let error = ServiceRegistry::from_config(&broker).expect_err("empty table is fatal");
        assert!(matches!(error, ConfigError::NoServices { .. }));
    }

    #[rstest]
    fn accepts_empty_table_with_service_port(broker: BrokerConfig) {
        let registry = ServiceRegistry::from_config(&broker.with_service_port(7200))
            .expect("service port brokers may start empty");
        assert!(registry.is_empty());
    }

    #[rstest]
    fn rejects_duplicate_service_ids(broker: BrokerConfig) {
        let error = ServiceRegistry::from_config(
            &broker
                .with_service(service("users", 7101))
                .with_service(service("users", 7102)),
        )
        .expect_err("duplicates are fatal");
        assert!(matches!(error, ConfigError::DuplicateService { service_id, .. } if service_id == "users"));
    }

    #[rstest]
    fn rejects_blank_service_ids(broker: BrokerConfig) {
        let error = ServiceRegistry::from_config(&broker.with_service(service("  ", 7101)))
            .expect_err("blank ids are fatal");
        assert!(matches!(error, ConfigError::EmptyServiceId { .. }));
    }
}
