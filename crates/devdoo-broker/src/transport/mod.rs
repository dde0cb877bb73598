//! Socket transport for the broker.
//!
//! Inbound clients connect to a [`SocketFrontend`] that gives every accepted
//! connection a routing identity and splits its byte stream into JSONL
//! frames. Backend sockets reuse the same stream wrapper and framing.

mod errors;
mod framing;
mod frontend;
mod stream;

use std::time::Duration;

pub use self::errors::{ListenerError, TransportError};
pub(crate) use self::framing::LineBuffer;
pub use self::frontend::{InboundEvent, InboundSocket, SocketFrontend};
pub(crate) use self::stream::{ConnectionStream, IoDeadline};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Converts a configured budget into a socket timeout.
///
/// The standard library rejects zero timeouts, so a zero budget means "no
/// timeout".
pub(crate) fn socket_timeout(budget: Duration) -> Option<Duration> {
    (!budget.is_zero()).then_some(budget)
}
