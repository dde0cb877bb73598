//! Error types for socket listener and stream operations.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::dispatch::ClientId;

/// Errors surfaced while binding the inbound listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host name could not be resolved.
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
        /// Resolver error.
        #[source]
        source: io::Error,
    },
    /// The TCP host name resolved to no addresses.
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty {
        /// Configured host.
        host: String,
        /// Configured port.
        port: u16,
    },
    /// The TCP listener could not be bound.
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        /// Resolved address.
        addr: SocketAddr,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// The listener could not be switched to non-blocking accepts.
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        /// Socket option error.
        #[source]
        source: io::Error,
    },
    /// Unix endpoints are not available on this platform.
    #[cfg(not(unix))]
    #[error("unix sockets are unsupported for endpoint {endpoint}")]
    UnsupportedUnix {
        /// Configured endpoint.
        endpoint: String,
    },
    /// The Unix listener could not be bound.
    #[cfg(unix)]
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: String,
        /// Bind error.
        #[source]
        source: io::Error,
    },
    /// Another process is serving on the socket path.
    #[cfg(unix)]
    #[error("existing unix socket {path} is already in use")]
    UnixInUse {
        /// Socket path.
        path: String,
    },
    /// The socket path is occupied by something other than a socket.
    #[cfg(unix)]
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket {
        /// Occupied path.
        path: String,
    },
    /// The socket path could not be inspected.
    #[cfg(unix)]
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        /// Socket path.
        path: String,
        /// Metadata error.
        #[source]
        source: io::Error,
    },
    /// Checking whether an existing socket is live failed.
    #[cfg(unix)]
    #[error("failed to probe existing unix socket {path}: {source}")]
    UnixConnect {
        /// Socket path.
        path: String,
        /// Connect error other than refusal.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be removed.
    #[cfg(unix)]
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: String,
        /// Removal error.
        #[source]
        source: io::Error,
    },
}

/// Errors raised while reading or writing a connected socket.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer closed the connection before a full frame arrived.
    #[error("connection closed by peer")]
    Closed,
    /// The socket did not become readable or writable in time.
    #[error("socket operation timed out after {timeout_ms} ms")]
    TimedOut {
        /// Budget that ran out.
        timeout_ms: u128,
    },
    /// A frame exceeded the configured size limit.
    #[error("frame of {size} bytes exceeds {max_size} byte limit")]
    FrameTooLarge {
        /// Bytes buffered without a terminator.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
    /// The peer sent a frame nobody asked for.
    #[error("unsolicited frame of {size} bytes on connection")]
    UnexpectedFrame {
        /// Stray bytes discarded.
        size: usize,
    },
    /// The reply addresses a client that is no longer connected.
    #[error("client {client} is not connected")]
    UnknownClient {
        /// Identity the reply was addressed to.
        client: ClientId,
    },
    /// Any other socket failure.
    #[error("socket I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classifies an I/O error raised under a socket timeout of `timeout`.
    pub(crate) fn from_io(error: io::Error, timeout: Duration) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::TimedOut {
                timeout_ms: timeout.as_millis(),
            },
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::Closed,
            _ => Self::Io(error),
        }
    }
}
