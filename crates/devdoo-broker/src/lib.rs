//! Request-routing broker for the devdoo service family.
//!
//! The broker accepts JSONL requests from edge clients, each naming a target
//! service. It resolves the service to a backend endpoint through a static
//! registry, reuses one cached connection per endpoint, forwards the request
//! and relays the single reply line back to the caller. Requests wait in a
//! FIFO queue with per-request deadlines; anything that expires before
//! dispatch is answered with a `Timeout` error.
//!
//! Everything runs on one thread. [`RouterLoop::turn`] dispatches at most one
//! request per iteration and the backend exchange is a blocking call bounded
//! by the configured dispatch timeout.
//!
//! Start-up goes through [`bootstrap_with`], which loads runtime settings
//! with `ortho_config`, installs `tracing` telemetry, fetches the broker
//! topology from a [`ConfigProvider`] and binds the frontend socket.

mod backends;
mod bootstrap;
mod broker;
mod dispatch;
mod health;
mod process;
mod queue;
mod registry;
mod router;
mod telemetry;
mod topology;
mod transport;

pub use backends::{
    BackendChannel, BackendConnectError, BackendConnector, ConnectionCache, SocketBackend,
    SocketConnector,
};
pub use bootstrap::{
    BootstrapError, BrokerRuntime, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use broker::{Broker, RoutingError};
pub use dispatch::{
    ClientEnvelope, ClientId, DispatchError, ErrorDetail, ErrorReply, ReplyBody, ReplyMessage,
    RequestHeader,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_broker};
pub use queue::{PendingRequest, RejectedRequest, RequestQueue};
pub use registry::ServiceRegistry;
pub use router::{LoopState, RouterLoop, RouterSettings, TurnSummary};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use topology::{
    BrokerConfig, BrokerKind, BrokerRole, ConfigError, ConfigProvider, FileConfigProvider,
    ServiceDescriptor, StaticConfigProvider,
};
pub use transport::{InboundEvent, InboundSocket, ListenerError, SocketFrontend, TransportError};

#[cfg(test)]
mod tests;
