//! Runtime configuration shared by the devdoo broker binary and its tests.
//!
//! Settings are layered by `ortho_config`: command-line flags override
//! `DEVDOO_*` environment variables, which override the configuration file
//! named by `--config-path` / `DEVDOO_CONFIG_PATH`, which overrides the
//! built-in defaults in [`defaults`]. The configuration only describes the
//! local process; the broker topology (frontend binding and service table)
//! comes from the topology document referenced by `topology_path`.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub mod defaults;
mod logging;
mod socket;

pub use defaults::{
    DEFAULT_BROKER_ID, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_DISPATCH_TIMEOUT_MS,
    DEFAULT_IDLE_POLL_MS, DEFAULT_LOG_FILTER, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_REPLY_TIMEOUT_MS,
    DEFAULT_REQUEST_TTL_MS, DEFAULT_TOPOLOGY_PATH, default_broker_id, default_log_filter, default_log_format,
    default_topology_path,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved settings for one broker process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "DEVDOO")]
pub struct Config {
    /// Identifier of the broker entry to load from the topology document.
    #[ortho_config(default = defaults::default_broker_id())]
    pub broker_id: String,
    /// Path of the JSON topology document.
    #[ortho_config(default = defaults::default_topology_path())]
    pub topology_path: Utf8PathBuf,
    /// `tracing` filter expression applied to broker logs.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format of broker logs.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Milliseconds a request may wait in the queue before timing out.
    #[ortho_config(default = DEFAULT_REQUEST_TTL_MS)]
    pub request_ttl_ms: u64,
    /// Milliseconds allowed for one backend round trip.
    #[ortho_config(default = DEFAULT_DISPATCH_TIMEOUT_MS)]
    pub dispatch_timeout_ms: u64,
    /// Milliseconds allowed for writing one reply to a client.
    #[ortho_config(default = DEFAULT_REPLY_TIMEOUT_MS)]
    pub reply_timeout_ms: u64,
    /// Milliseconds allowed for establishing a backend connection.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// Longest idle wait, in milliseconds, for inbound traffic.
    #[ortho_config(default = DEFAULT_IDLE_POLL_MS)]
    pub idle_poll_ms: u64,
    /// Largest accepted request line in bytes.
    #[ortho_config(default = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker_id: defaults::default_broker_id(),
            topology_path: defaults::default_topology_path(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            request_ttl_ms: DEFAULT_REQUEST_TTL_MS,
            dispatch_timeout_ms: DEFAULT_DISPATCH_TIMEOUT_MS,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            idle_poll_ms: DEFAULT_IDLE_POLL_MS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

impl Config {
    /// Identifier of the broker this process runs.
    #[must_use]
    pub const fn broker_id(&self) -> &str {
        self.broker_id.as_str()
    }

    /// Location of the topology document.
    #[must_use]
    pub fn topology_path(&self) -> &Utf8Path {
        self.topology_path.as_path()
    }

    /// `tracing` filter expression.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Queue lifetime of each request.
    #[must_use]
    pub const fn request_ttl(&self) -> Duration {
        Duration::from_millis(self.request_ttl_ms)
    }

    /// Bound on a single backend round trip.
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Bound on writing one reply to a client.
    #[must_use]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Bound on establishing a backend connection.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Longest idle wait for inbound traffic.
    #[must_use]
    pub const fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    /// Largest accepted request line in bytes.
    #[must_use]
    pub const fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }
}
