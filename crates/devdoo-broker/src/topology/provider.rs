//! Config Provider adapters.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::document::TopologyDocument;
use super::{BrokerConfig, ConfigError};

/// Supplies the topology of a broker by identifier.
pub trait ConfigProvider {
    /// Loads the topology for `broker_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the topology is missing, unreachable, or
    /// malformed. Callers treat every error as fatal.
    fn load_config(&self, broker_id: &str) -> Result<BrokerConfig, ConfigError>;
}

/// Provider backed by a JSON topology document on disk.
///
/// The document is read on every call so a restarted broker always sees the
/// current file.
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    /// Builds a provider over the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the topology document.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    fn read_document(&self) -> Result<TopologyDocument, ConfigError> {
        let contents = fs::read(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_slice(&contents).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl ConfigProvider for FileConfigProvider {
    fn load_config(&self, broker_id: &str) -> Result<BrokerConfig, ConfigError> {
        let mut document = self.read_document()?;
        let entry = document
            .brokers
            .remove(broker_id)
            .ok_or_else(|| ConfigError::unknown_broker(broker_id))?;
        entry.into_config(broker_id)
    }
}

/// Provider serving configurations held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    brokers: HashMap<String, BrokerConfig>,
}

impl StaticConfigProvider {
    /// Builds an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `config` under its own broker identifier.
    #[must_use]
    pub fn with_broker(mut self, config: BrokerConfig) -> Self {
        self.brokers.insert(config.id().to_owned(), config);
        self
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn load_config(&self, broker_id: &str) -> Result<BrokerConfig, ConfigError> {
        self.brokers
            .get(broker_id)
            .cloned()
            .ok_or_else(|| ConfigError::unknown_broker(broker_id))
    }
}

#[cfg(test)]
mod tests {
    use devdoo_config::SocketEndpoint;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;
    use crate::topology::BrokerKind;

    const DOCUMENT: &str = r#"{
        "brokers": {
            "users-broker": {
                "network": {"ip": "127.0.0.1", "port": 7000},
                "services": [{"id": "users", "address": "tcp://127.0.0.1:7101"}],
                "service_port": null,
                "type": "leaf"
            }
        }
    }"#;

    #[fixture]
    fn topology_dir() -> TempDir {
        TempDir::new().expect("temp dir")
    }

    fn write_document(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("topology.json");
        fs::write(&path, contents).expect("write topology");
        path
    }

    #[rstest]
    fn file_provider_loads_named_broker(topology_dir: TempDir) {
        let provider = FileConfigProvider::new(write_document(&topology_dir, DOCUMENT));
        let config = provider
            .load_config("users-broker")
            .expect("broker should load");
        assert_eq!(config.id(), "users-broker");
        assert_eq!(config.kind(), BrokerKind::Leaf);
        assert_eq!(config.services().len(), 1);
    }

    #[rstest]
    fn file_provider_reports_unknown_broker(topology_dir: TempDir) {
        let provider = FileConfigProvider::new(write_document(&topology_dir, DOCUMENT));
        let error = provider
            .load_config("orders-broker")
            .expect_err("unknown broker must fail");
        assert!(matches!(error, ConfigError::UnknownBroker { .. }));
    }

    #[rstest]
    fn file_provider_reports_missing_file(topology_dir: TempDir) {
        let provider = FileConfigProvider::new(topology_dir.path().join("absent.json"));
        let error = provider
            .load_config("users-broker")
            .expect_err("missing file must fail");
        assert!(matches!(error, ConfigError::Read { .. }));
    }

    #[rstest]
    fn file_provider_reports_malformed_json(topology_dir: TempDir) {
        let provider = FileConfigProvider::new(write_document(&topology_dir, "{\"brokers\":"));
        let error = provider
            .load_config("users-broker")
            .expect_err("malformed file must fail");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }

    #[test]
    fn static_provider_serves_registered_brokers() {
        let config = BrokerConfig::new(
            "b1",
            SocketEndpoint::tcp("127.0.0.1", 7000),
            BrokerKind::Leaf,
        );
        let provider = StaticConfigProvider::new().with_broker(config.clone());
        assert_eq!(provider.load_config("b1").expect("known broker"), config);
        assert!(provider.load_config("b2").is_err());
    }
}
