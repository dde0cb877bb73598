//! Broker process entry point and signal handling.

use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use ortho_config::OrthoError;
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use thiserror::Error;
use tracing::info;

use crate::backends::SocketConnector;
use crate::bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
use crate::health::StructuredHealthReporter;
use crate::topology::FileConfigProvider;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Errors surfaced while launching the broker process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Registration error from the signal handler.
        #[source]
        source: io::Error,
    },
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}

/// Loads configuration, bootstraps the broker and runs the router loop until
/// SIGTERM, SIGINT or SIGQUIT arrives.
///
/// # Errors
///
/// Returns a [`LaunchError`] when start-up fails. Once the loop is running
/// the broker only returns after a shutdown signal.
pub fn run_broker() -> Result<(), LaunchError> {
    let config = SystemConfigLoader.load()?;
    let provider = FileConfigProvider::new(config.topology_path().as_std_path());
    let connector = SocketConnector::from_config(&config);
    let reporter = Arc::new(StructuredHealthReporter::new());
    let runtime = bootstrap_with(
        &StaticConfigLoader::new(config),
        reporter,
        &provider,
        connector,
    )?;

    let mut router = runtime.into_router();
    install_signal_handlers(&router.shutdown_flag())?;
    router.run();
    info!(target: PROCESS_TARGET, "broker stopped");
    Ok(())
}

fn install_signal_handlers(flag: &Arc<AtomicBool>) -> Result<(), LaunchError> {
    for signal in [SIGTERM, SIGINT, SIGQUIT] {
        signal_hook::flag::register(signal, Arc::clone(flag))
            .map_err(|source| LaunchError::Signals { source })?;
    }
    Ok(())
}
