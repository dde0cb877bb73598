//! Socket-backed backend channels.

use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use devdoo_config::{Config, SocketEndpoint};

use super::{BackendChannel, BackendConnectError, BackendConnector};
use crate::topology::ServiceDescriptor;
use crate::transport::{ConnectionStream, IoDeadline, LineBuffer, TransportError, socket_timeout};

const READ_CHUNK: usize = 8 * 1024;

/// Opens JSONL channels to backend sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketConnector {
    connect_timeout: Duration,
    io_timeout: Duration,
    max_reply_bytes: usize,
}

impl SocketConnector {
    /// Builds a connector with explicit budgets.
    ///
    /// `io_timeout` bounds each round trip and `max_reply_bytes` caps one
    /// reply frame. A zero timeout means unbounded.
    #[must_use]
    pub const fn new(connect_timeout: Duration, io_timeout: Duration, max_reply_bytes: usize) -> Self {
        Self {
            connect_timeout,
            io_timeout,
            max_reply_bytes,
        }
    }

    /// Takes timeouts and the frame limit from the broker configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(
            config.connect_timeout(),
            config.dispatch_timeout(),
            config.max_request_bytes(),
        )
    }

    fn open(&self, service: &ServiceDescriptor) -> Result<ConnectionStream, BackendConnectError> {
        match service.backend_endpoint() {
            SocketEndpoint::Tcp { host, port } => {
                let addrs = (host.as_str(), *port).to_socket_addrs().map_err(|source| {
                    BackendConnectError::with_source(
                        service,
                        "failed to resolve backend address",
                        source,
                    )
                })?;
                let mut last_error = None;
                for addr in addrs {
                    let attempt = match socket_timeout(self.connect_timeout) {
                        Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                        None => TcpStream::connect(addr),
                    };
                    match attempt {
                        Ok(stream) => {
                            stream.set_nodelay(true).map_err(|source| {
                                BackendConnectError::with_source(
                                    service,
                                    "failed to configure backend socket",
                                    source,
                                )
                            })?;
                            return Ok(ConnectionStream::Tcp(stream));
                        }
                        Err(error) => last_error = Some(error),
                    }
                }
                Err(match last_error {
                    Some(error) => {
                        BackendConnectError::with_source(service, "connection failed", error)
                    }
                    None => BackendConnectError::new(service, "address resolved to no sockets"),
                })
            }
            SocketEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    UnixStream::connect(path.as_std_path())
                        .map(ConnectionStream::Unix)
                        .map_err(|source| {
                            BackendConnectError::with_source(service, "connection failed", source)
                        })
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    Err(BackendConnectError::new(
                        service,
                        "unix sockets are unsupported on this platform",
                    ))
                }
            }
        }
    }
}

impl BackendConnector for SocketConnector {
    type Channel = SocketBackend;

    fn connect(&self, service: &ServiceDescriptor) -> Result<Self::Channel, BackendConnectError> {
        let stream = self.open(service)?;
        Ok(SocketBackend {
            endpoint: service.backend_endpoint().clone(),
            stream,
            buffer: LineBuffer::new(self.max_reply_bytes),
            io_timeout: self.io_timeout,
            exchange: None,
        })
    }
}

/// Blocking JSONL channel to one backend endpoint.
///
/// A whole round trip, from the first byte written to the reply's newline,
/// must finish within the dispatch timeout. Any byte the backend sends
/// outside an exchange fails the next `send`, so the cache evicts the
/// connection instead of handing a stray reply to another client.
#[derive(Debug)]
pub struct SocketBackend {
    endpoint: SocketEndpoint,
    stream: ConnectionStream,
    buffer: LineBuffer,
    io_timeout: Duration,
    exchange: Option<IoDeadline>,
}

impl SocketBackend {
    /// Endpoint this channel is connected to.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Fails when the backend has sent bytes nobody asked for.
    fn ensure_idle(&mut self) -> Result<(), TransportError> {
        let stray = match self.buffer.pending_len() {
            0 => self.unsolicited_bytes()?,
            pending => pending,
        };
        if stray > 0 {
            self.buffer.clear();
            return Err(TransportError::UnexpectedFrame { size: stray });
        }
        Ok(())
    }

    /// Reads whatever is already waiting on the socket without blocking.
    fn unsolicited_bytes(&mut self) -> Result<usize, TransportError> {
        let mut chunk = [0_u8; READ_CHUNK];
        self.stream.set_nonblocking(true).map_err(TransportError::Io)?;
        let outcome = self.stream.read(&mut chunk);
        self.stream
            .set_nonblocking(false)
            .map_err(TransportError::Io)?;
        match outcome {
            Ok(0) => Err(TransportError::Closed),
            Ok(read) => Ok(read),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(error) => Err(TransportError::from_io(error, self.io_timeout)),
        }
    }
}

impl BackendChannel for SocketBackend {
    fn send(&mut self, request: &[u8]) -> Result<(), TransportError> {
        self.exchange = None;
        self.ensure_idle()?;
        let deadline = IoDeadline::start(self.io_timeout, Instant::now());
        self.exchange = Some(deadline);
        self.stream.write_line(request, deadline)
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let deadline = self
            .exchange
            .take()
            .unwrap_or_else(|| IoDeadline::start(self.io_timeout, Instant::now()));
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            if let Some(frame) = self.buffer.next_line()? {
                return Ok(frame);
            }
            match self.stream.read_within(&mut chunk, deadline)? {
                0 => return Err(TransportError::Closed),
                read => self.buffer.extend(chunk.get(..read).unwrap_or_default()),
            }
        }
    }
}
