//! Broker bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use devdoo_config::{Config, SocketPreparationError};

use crate::backends::BackendConnector;
use crate::broker::Broker;
use crate::health::HealthReporter;
use crate::registry::ServiceRegistry;
use crate::router::{RouterLoop, RouterSettings};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::topology::{BrokerConfig, ConfigError, ConfigProvider};
use crate::transport::{ListenerError, SocketFrontend};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the broker runtime configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a configuration resolved earlier.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Runtime configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The broker topology could not be loaded or is invalid.
    #[error("failed to load broker topology: {source}")]
    Topology {
        /// Provider or registry error.
        #[source]
        source: ConfigError,
    },
    /// The Unix socket directory could not be prepared.
    #[error("failed to prepare frontend socket: {source}")]
    Socket {
        /// Filesystem error reported while preparing the socket directory.
        #[source]
        source: SocketPreparationError,
    },
    /// The frontend socket could not be bound.
    #[error("failed to bind frontend socket: {source}")]
    Listener {
        /// Bind failure reported by the frontend.
        #[source]
        source: ListenerError,
    },
}

/// A bootstrapped broker, bound and ready to route.
pub struct BrokerRuntime<C>
where
    C: BackendConnector,
{
    config: Config,
    topology: BrokerConfig,
    telemetry: TelemetryHandle,
    router: RouterLoop<SocketFrontend, C>,
}

impl<C> BrokerRuntime<C>
where
    C: BackendConnector,
{
    /// Runtime configuration the broker was started with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Topology fetched for this broker.
    #[must_use]
    pub const fn topology(&self) -> &BrokerConfig {
        &self.topology
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Router loop driving the broker.
    #[must_use]
    pub const fn router(&self) -> &RouterLoop<SocketFrontend, C> {
        &self.router
    }

    /// Mutable access to the router loop, for driving turns by hand.
    pub const fn router_mut(&mut self) -> &mut RouterLoop<SocketFrontend, C> {
        &mut self.router
    }

    /// Releases the router loop so it can be driven by the caller.
    #[must_use]
    pub fn into_router(self) -> RouterLoop<SocketFrontend, C> {
        self.router
    }
}

/// Bootstraps the broker using the supplied collaborators.
///
/// Loads runtime configuration, installs telemetry, fetches the topology for
/// the configured broker id, builds the service registry and binds the
/// frontend socket. Any failure is reported and aborts start-up.
///
/// # Errors
///
/// Returns the first [`BootstrapError`] encountered.
pub fn bootstrap_with<C>(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    provider: &dyn ConfigProvider,
    connector: C,
) -> Result<BrokerRuntime<C>, BootstrapError>
where
    C: BackendConnector,
{
    reporter.bootstrap_starting();
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;
    let telemetry = telemetry::initialise(&config)
        .map_err(|source| fail(BootstrapError::Telemetry { source }))?;
    let topology = provider
        .load_config(config.broker_id())
        .map_err(|source| fail(BootstrapError::Topology { source }))?;
    let registry = ServiceRegistry::from_config(&topology)
        .map_err(|source| fail(BootstrapError::Topology { source }))?;

    topology
        .frontend()
        .prepare_filesystem()
        .map_err(|source| fail(BootstrapError::Socket { source }))?;
    let frontend = SocketFrontend::bind(
        topology.frontend(),
        config.max_request_bytes(),
        config.reply_timeout(),
    )
    .map_err(|source| fail(BootstrapError::Listener { source }))?;

    let broker = Broker::new(registry, connector, Arc::clone(&reporter));
    let router = RouterLoop::new(
        frontend,
        broker,
        RouterSettings::from_config(&config),
        Arc::clone(&reporter),
    );
    reporter.bootstrap_succeeded(&config, &topology);

    Ok(BrokerRuntime {
        config,
        topology,
        telemetry,
        router,
    })
}
