//! Errors reported back to inbound clients.

use std::time::Duration;

use thiserror::Error;

use crate::broker::RoutingError;
use crate::transport::TransportError;

/// Failures a client can observe for one request.
///
/// Each variant maps to the `kind` string of an error reply.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The frame is not a routable request.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// What is wrong with the frame.
        message: String,
        /// JSON error, when the frame failed to parse.
        #[source]
        source: Option<serde_json::Error>,
    },
    /// The frame exceeds the configured size limit.
    #[error("request of {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
    /// The target service could not be resolved to a backend.
    #[error(transparent)]
    Routing(#[from] RoutingError),
    /// The request outlived its deadline in the queue.
    #[error("request expired after {waited_ms} ms in the queue")]
    Timeout {
        /// Time the request spent queued.
        waited_ms: u128,
    },
    /// The broker stopped before the request was dispatched.
    #[error("broker shutting down")]
    ShuttingDown,
    /// Forwarding to the backend or reading its reply failed.
    #[error("backend exchange for service '{service_id}' failed: {source}")]
    Transport {
        /// Service the request was addressed to.
        service_id: String,
        /// Socket failure.
        #[source]
        source: TransportError,
    },
    /// An error reply could not be serialised.
    #[error("failed to serialise reply: {0}")]
    SerializeResponse(#[from] serde_json::Error),
}

impl DispatchError {
    /// Creates a malformed request error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a malformed request error backed by a JSON parse failure.
    #[must_use]
    pub fn malformed_json(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedRequest {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a queue expiry error for a request that waited `waited`.
    #[must_use]
    pub const fn timeout(waited: Duration) -> Self {
        Self::Timeout {
            waited_ms: waited.as_millis(),
        }
    }

    /// Creates a backend exchange failure.
    #[must_use]
    pub fn transport(service_id: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            service_id: service_id.into(),
            source,
        }
    }

    /// Wire `kind` string of the error reply.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRequest { .. } => "MalformedRequest",
            Self::RequestTooLarge { .. } => "RequestTooLarge",
            Self::Routing(error) => error.kind(),
            Self::Timeout { .. } | Self::ShuttingDown => "Timeout",
            Self::Transport { .. } | Self::SerializeResponse(_) => "TransportError",
        }
    }
}

impl From<TransportError> for DispatchError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::FrameTooLarge { size, max_size } => {
                Self::RequestTooLarge { size, max_size }
            }
            other => Self::Transport {
                service_id: String::new(),
                source: other,
            },
        }
    }
}
