//! Built-in values used when no layer sets a field.

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Broker identifier used when none is configured.
pub const DEFAULT_BROKER_ID: &str = "devdoo";

/// Topology document consulted when no path is configured.
pub const DEFAULT_TOPOLOGY_PATH: &str = "devdoo-topology.json";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Lifetime of a queued request before it is answered with a timeout.
pub const DEFAULT_REQUEST_TTL_MS: u64 = 5_000;

/// Upper bound on a single backend round trip.
pub const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on writing one reply to a client.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 1_000;

/// Upper bound on establishing a backend connection.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1_000;

/// Longest the router waits for inbound traffic while the queue is empty.
pub const DEFAULT_IDLE_POLL_MS: u64 = 250;

/// Largest accepted request line, newline included.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Owned broker identifier used where allocation is required (e.g. serde).
#[must_use]
pub fn default_broker_id() -> String {
    DEFAULT_BROKER_ID.to_owned()
}

/// Default location of the topology document.
#[must_use]
pub fn default_topology_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_TOPOLOGY_PATH)
}

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
