//! Stream wrapper over the socket families the broker speaks.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

use super::{TransportError, socket_timeout};

/// Time budget shared by every socket call of one exchange.
///
/// Socket timeouts only bound a single call, so a peer trickling bytes could
/// otherwise hold an exchange open indefinitely. A zero budget never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IoDeadline {
    budget: Duration,
    expires: Option<Instant>,
}

impl IoDeadline {
    /// Starts a deadline `budget` after `now`.
    pub(crate) fn start(budget: Duration, now: Instant) -> Self {
        Self {
            budget,
            expires: socket_timeout(budget).map(|timeout| now + timeout),
        }
    }

    /// Socket timeout for the next call, or [`TransportError::TimedOut`] once
    /// the budget is spent.
    pub(crate) fn remaining(self, now: Instant) -> Result<Option<Duration>, TransportError> {
        let Some(expires) = self.expires else {
            return Ok(None);
        };
        let left = expires.saturating_duration_since(now);
        if left.is_zero() {
            return Err(self.elapsed());
        }
        Ok(Some(left))
    }

    /// Error reported when the budget runs out.
    pub(crate) const fn elapsed(self) -> TransportError {
        TransportError::TimedOut {
            timeout_ms: self.budget.as_millis(),
        }
    }

    pub(crate) fn classify(self, error: io::Error) -> TransportError {
        TransportError::from_io(error, self.budget)
    }
}

/// Connected stream, either TCP or Unix domain.
#[derive(Debug)]
pub(crate) enum ConnectionStream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    pub(crate) fn set_nonblocking(&self, nonblocking: bool) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_nonblocking(nonblocking),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_nonblocking(nonblocking),
        }
    }

    pub(crate) fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_read_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_read_timeout(timeout),
        }
    }

    pub(crate) fn set_write_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.set_write_timeout(timeout),
            #[cfg(unix)]
            Self::Unix(stream) => stream.set_write_timeout(timeout),
        }
    }

    /// Writes `frame` and its newline terminator before `deadline` passes.
    ///
    /// The stream must be in blocking mode.
    pub(crate) fn write_line(
        &mut self,
        frame: &[u8],
        deadline: IoDeadline,
    ) -> Result<(), TransportError> {
        let mut line = Vec::with_capacity(frame.len() + 1);
        line.extend_from_slice(frame);
        line.push(b'\n');

        let mut written = 0;
        while let Some(rest) = line.get(written..).filter(|tail| !tail.is_empty()) {
            let timeout = deadline.remaining(Instant::now())?;
            self.set_write_timeout(timeout)
                .map_err(|source| deadline.classify(source))?;
            match self.write(rest) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(count) => written += count,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(deadline.classify(error)),
            }
        }
        self.flush().map_err(|source| deadline.classify(source))
    }

    /// Reads once into `buf`, waiting no later than `deadline`.
    ///
    /// The stream must be in blocking mode. `Ok(0)` means the peer closed.
    pub(crate) fn read_within(
        &mut self,
        buf: &mut [u8],
        deadline: IoDeadline,
    ) -> Result<usize, TransportError> {
        loop {
            let timeout = deadline.remaining(Instant::now())?;
            self.set_read_timeout(timeout)
                .map_err(|source| deadline.classify(source))?;
            match self.read(buf) {
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                outcome => return outcome.map_err(|source| deadline.classify(source)),
            }
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}
