//! Identity-routing inbound socket.
//!
//! Every accepted connection is tagged with a [`ClientId`]. Complete JSONL
//! frames read from any connection surface as [`InboundEvent`]s, and replies
//! are written back to the connection named by the identity they carry.

use std::collections::{BTreeMap, VecDeque};
use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use devdoo_config::SocketEndpoint;

use super::{
    ConnectionStream, IoDeadline, LineBuffer, ListenerError, TRANSPORT_TARGET, TransportError,
};
use crate::dispatch::{ClientEnvelope, ClientId, DispatchError};

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

const POLL_BACKOFF: Duration = Duration::from_millis(5);
const READ_CHUNK: usize = 8 * 1024;

/// Something the inbound socket produced for the router.
#[derive(Debug)]
pub enum InboundEvent {
    /// A complete request frame from a connected client.
    Request(ClientEnvelope),
    /// A frame that could not be accepted. The client gets an error reply
    /// and is then disconnected.
    Rejected {
        /// Client that sent the frame.
        client: ClientId,
        /// Reason for the rejection.
        error: DispatchError,
    },
}

/// Identity-routing socket the router receives requests from.
pub trait InboundSocket {
    /// Waits up to `timeout` for the next inbound event.
    ///
    /// A zero timeout checks for ready input without waiting.
    fn poll_event(&mut self, timeout: Duration) -> Option<InboundEvent>;

    /// Writes one reply frame to `client`.
    fn send(&mut self, client: ClientId, frame: &[u8]) -> Result<(), TransportError>;

    /// Drops the connection identified by `client`.
    fn disconnect(&mut self, client: ClientId);
}

/// Socket frontend multiplexing every inbound client on one thread.
#[derive(Debug)]
pub struct SocketFrontend {
    endpoint: SocketEndpoint,
    listener: ListenerKind,
    clients: BTreeMap<ClientId, ClientConnection>,
    inbox: VecDeque<InboundEvent>,
    next_client: u64,
    max_frame_bytes: usize,
    reply_timeout: Duration,
    last_accept_error: Option<io::ErrorKind>,
}

#[derive(Debug)]
enum ListenerKind {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl SocketFrontend {
    /// Binds the frontend endpoint and switches it to non-blocking accepts.
    ///
    /// Frames longer than `max_frame_bytes` are rejected. Each reply write
    /// must finish within `reply_timeout`, or the client is dropped. A stale
    /// Unix socket file left by a previous run is removed; a live one is
    /// reported as in use.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the endpoint cannot be resolved, bound
    /// or switched to non-blocking mode.
    pub fn bind(
        endpoint: &SocketEndpoint,
        max_frame_bytes: usize,
        reply_timeout: Duration,
    ) -> Result<Self, ListenerError> {
        let listener = match endpoint {
            SocketEndpoint::Tcp { host, port } => ListenerKind::Tcp(bind_tcp(host, *port)?),
            SocketEndpoint::Unix { path } => {
                #[cfg(unix)]
                {
                    ListenerKind::Unix(bind_unix(path.as_std_path())?)
                }

                #[cfg(not(unix))]
                {
                    let _ = path;
                    return Err(ListenerError::UnsupportedUnix {
                        endpoint: endpoint.to_string(),
                    });
                }
            }
        };
        let frontend = Self {
            endpoint: endpoint.clone(),
            listener,
            clients: BTreeMap::new(),
            inbox: VecDeque::new(),
            next_client: 0,
            max_frame_bytes,
            reply_timeout,
            last_accept_error: None,
        };
        let nonblocking = match &frontend.listener {
            ListenerKind::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            ListenerKind::Unix(listener) => listener.set_nonblocking(true),
        };
        // Dropping the frontend on this path removes a Unix socket file.
        nonblocking.map_err(|source| ListenerError::NonBlocking { source })?;
        info!(
            target: TRANSPORT_TARGET,
            endpoint = %frontend.endpoint,
            "frontend socket bound"
        );
        Ok(frontend)
    }

    /// Endpoint the frontend was bound to.
    #[must_use]
    pub const fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }

    /// Local address of a TCP frontend, used when binding to port zero.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.listener {
            ListenerKind::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            ListenerKind::Unix(_) => None,
        }
    }

    /// Number of connections currently tracked.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    fn accept_pending(&mut self) {
        loop {
            match accept_connection(&self.listener) {
                Ok(Some(stream)) => {
                    self.last_accept_error = None;
                    self.next_client += 1;
                    let client = ClientId::new(self.next_client);
                    debug!(target: TRANSPORT_TARGET, %client, "client connected");
                    self.clients.insert(
                        client,
                        ClientConnection::new(stream, self.max_frame_bytes),
                    );
                }
                Ok(None) => return,
                Err(error) => {
                    let kind = error.kind();
                    if self.last_accept_error != Some(kind) {
                        warn!(
                            target: TRANSPORT_TARGET,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    self.last_accept_error = Some(kind);
                    return;
                }
            }
        }
    }

    fn read_clients(&mut self) {
        for (client, connection) in &mut self.clients {
            if !connection.read_closed {
                connection.pump(*client, &mut self.inbox);
            }
        }
        self.clients.retain(|client, connection| {
            let keep = !connection.is_finished();
            if !keep {
                debug!(target: TRANSPORT_TARGET, %client, "client disconnected");
            }
            keep
        });
    }
}

impl InboundSocket for SocketFrontend {
    fn poll_event(&mut self, timeout: Duration) -> Option<InboundEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.inbox.pop_front() {
                return Some(event);
            }
            self.accept_pending();
            self.read_clients();
            if let Some(event) = self.inbox.pop_front() {
                return Some(event);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(POLL_BACKOFF.min(deadline - now));
        }
    }

    fn send(&mut self, client: ClientId, frame: &[u8]) -> Result<(), TransportError> {
        let Some(connection) = self.clients.get_mut(&client) else {
            return Err(TransportError::UnknownClient { client });
        };
        connection.outstanding = connection.outstanding.saturating_sub(1);
        let result = connection.write_frame(frame, self.reply_timeout);
        if result.is_err() {
            connection.broken = true;
        }
        if connection.is_finished() {
            self.clients.remove(&client);
            debug!(target: TRANSPORT_TARGET, %client, "client disconnected");
        }
        result
    }

    fn disconnect(&mut self, client: ClientId) {
        if self.clients.remove(&client).is_some() {
            debug!(target: TRANSPORT_TARGET, %client, "client dropped");
        }
    }
}

impl Drop for SocketFrontend {
    fn drop(&mut self) {
        #[cfg(unix)]
        cleanup_unix_socket(&self.endpoint);
    }
}

/// Per-client connection state.
///
/// A client that half-closes its write side stays tracked until every
/// request it sent has been answered.
#[derive(Debug)]
struct ClientConnection {
    stream: ConnectionStream,
    buffer: LineBuffer,
    outstanding: usize,
    read_closed: bool,
    broken: bool,
}

impl ClientConnection {
    fn new(stream: ConnectionStream, max_frame_bytes: usize) -> Self {
        Self {
            stream,
            buffer: LineBuffer::new(max_frame_bytes),
            outstanding: 0,
            read_closed: false,
            broken: false,
        }
    }

    fn is_finished(&self) -> bool {
        self.broken || (self.read_closed && self.outstanding == 0)
    }

    fn pump(&mut self, client: ClientId, inbox: &mut VecDeque<InboundEvent>) {
        let mut chunk = [0_u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    self.read_closed = true;
                    if let Some(frame) = self.buffer.take_remainder() {
                        self.emit(client, frame, inbox);
                    }
                    return;
                }
                Ok(read) => {
                    self.buffer.extend(chunk.get(..read).unwrap_or_default());
                    if !self.drain_frames(client, inbox) {
                        return;
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    debug!(
                        target: TRANSPORT_TARGET,
                        %client,
                        error = %error,
                        "client read failed"
                    );
                    self.read_closed = true;
                    self.broken = true;
                    return;
                }
            }
        }
    }

    /// Moves complete frames into the inbox. Returns `false` once the
    /// connection has been rejected for an oversized frame.
    fn drain_frames(&mut self, client: ClientId, inbox: &mut VecDeque<InboundEvent>) -> bool {
        loop {
            match self.buffer.next_line() {
                Ok(Some(frame)) => self.emit(client, frame, inbox),
                Ok(None) => return true,
                Err(error) => {
                    warn!(
                        target: TRANSPORT_TARGET,
                        %client,
                        error = %error,
                        "rejecting oversized request"
                    );
                    self.buffer.clear();
                    self.read_closed = true;
                    self.outstanding += 1;
                    inbox.push_back(InboundEvent::Rejected {
                        client,
                        error: DispatchError::from(error),
                    });
                    return false;
                }
            }
        }
    }

    fn emit(&mut self, client: ClientId, frame: Vec<u8>, inbox: &mut VecDeque<InboundEvent>) {
        self.outstanding += 1;
        inbox.push_back(InboundEvent::Request(ClientEnvelope::new(client, frame)));
    }

    /// Writes one reply line, giving up once `budget` has passed.
    fn write_frame(&mut self, frame: &[u8], budget: Duration) -> Result<(), TransportError> {
        let deadline = IoDeadline::start(budget, Instant::now());
        self.stream
            .set_nonblocking(false)
            .map_err(|source| deadline.classify(source))?;
        let written = self.stream.write_line(frame, deadline);
        let restored = self.stream.set_nonblocking(true);
        written?;
        restored.map_err(|source| deadline.classify(source))
    }
}

fn accept_connection(listener: &ListenerKind) -> Result<Option<ConnectionStream>, io::Error> {
    match listener {
        ListenerKind::Tcp(tcp) => match tcp.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                stream.set_nodelay(true)?;
                Ok(Some(ConnectionStream::Tcp(stream)))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        },
        #[cfg(unix)]
        ListenerKind::Unix(unix) => match unix.accept() {
            Ok((stream, _)) => {
                stream.set_nonblocking(true)?;
                Ok(Some(ConnectionStream::Unix(stream)))
            }
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        },
    }
}

fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::BindTcp { addr, source })
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path.exists() {
        let metadata =
            fs::symlink_metadata(path).map_err(|source| ListenerError::UnixMetadata {
                path: path.display().to_string(),
                source,
            })?;
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::UnixNotSocket {
                path: path.display().to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(ListenerError::UnixInUse {
                    path: path.display().to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                    path: path.display().to_string(),
                    source,
                })?;
            }
            Err(error) => {
                return Err(ListenerError::UnixConnect {
                    path: path.display().to_string(),
                    source: error,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(unix)]
fn cleanup_unix_socket(endpoint: &SocketEndpoint) {
    let SocketEndpoint::Unix { path } = endpoint else {
        return;
    };
    if let Err(error) = fs::remove_file(path.as_std_path())
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: TRANSPORT_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}
