//! Replies routed back to inbound clients.

use serde::Serialize;
use serde_json::Value;

use super::{ClientId, DispatchError};

/// Structured error reply.
///
/// Serialises as `{"ack": <request id or null>, "error": {"kind", "detail"}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReply {
    ack: Value,
    error: ErrorDetail,
}

/// Error kind and human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    kind: &'static str,
    detail: String,
}

impl ErrorReply {
    /// Builds the reply for `error`, acknowledging request `ack`.
    #[must_use]
    pub fn new(ack: Value, error: &DispatchError) -> Self {
        Self {
            ack,
            error: ErrorDetail {
                kind: error.kind(),
                detail: error.to_string(),
            },
        }
    }

    /// Request id the reply acknowledges.
    #[must_use]
    pub const fn ack(&self) -> &Value {
        &self.ack
    }

    /// Wire kind of the error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.error.kind
    }

    /// Human-readable description of the error.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.error.detail
    }
}

/// Body of a reply frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// Backend reply, relayed byte for byte.
    Backend(Vec<u8>),
    /// Error produced by the broker itself.
    Error(ErrorReply),
}

/// Reply addressed to one client identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMessage {
    client: ClientId,
    body: ReplyBody,
}

impl ReplyMessage {
    /// Relays a backend reply.
    #[must_use]
    pub const fn backend(client: ClientId, body: Vec<u8>) -> Self {
        Self {
            client,
            body: ReplyBody::Backend(body),
        }
    }

    /// Builds an error reply for `error`.
    #[must_use]
    pub fn error(client: ClientId, ack: Value, error: &DispatchError) -> Self {
        Self {
            client,
            body: ReplyBody::Error(ErrorReply::new(ack, error)),
        }
    }

    /// Identity the reply is addressed to.
    #[must_use]
    pub const fn client(&self) -> ClientId {
        self.client
    }

    /// Reply payload.
    #[must_use]
    pub const fn body(&self) -> &ReplyBody {
        &self.body
    }

    /// Encodes the reply as one frame, without the line terminator.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SerializeResponse`] if an error reply cannot
    /// be serialised.
    pub fn encode(&self) -> Result<Vec<u8>, DispatchError> {
        match &self.body {
            ReplyBody::Backend(bytes) => Ok(bytes.clone()),
            ReplyBody::Error(reply) => Ok(serde_json::to_vec(reply)?),
        }
    }
}
