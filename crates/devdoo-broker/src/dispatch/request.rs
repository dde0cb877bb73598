//! Inbound request envelopes and header parsing.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::DispatchError;

/// Routing identity of one inbound connection.
///
/// Identities are assigned in connection order and never reused while the
/// broker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl ClientId {
    /// Wraps a raw identity.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// One inbound frame tagged with the identity it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnvelope {
    client: ClientId,
    body: Vec<u8>,
}

impl ClientEnvelope {
    /// Builds an envelope.
    #[must_use]
    pub fn new(client: ClientId, body: impl Into<Vec<u8>>) -> Self {
        Self {
            client,
            body: body.into(),
        }
    }

    /// Identity the frame arrived on.
    #[must_use]
    pub const fn client(&self) -> ClientId {
        self.client
    }

    /// Raw frame bytes, without the line terminator.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Routing fields of an inbound request.
///
/// Only the fields the broker routes on are read. The payload travels to the
/// backend untouched inside the original frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestHeader {
    #[serde(default)]
    id: Value,
    service: String,
    #[serde(default)]
    action: Option<String>,
}

impl RequestHeader {
    /// Parses the routing fields from a request frame.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedRequest`] when the frame is empty,
    /// is not a JSON object with a string `service` field, or names a blank
    /// service.
    pub fn parse(body: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = trim_trailing_whitespace(body);
        if trimmed.is_empty() {
            return Err(DispatchError::malformed("request frame is empty"));
        }
        let mut header: Self = serde_json::from_slice(trimmed).map_err(|source| {
            DispatchError::malformed_json("request frame is not a valid request object", source)
        })?;
        let service = header.service.trim();
        if service.is_empty() {
            return Err(DispatchError::malformed("service field is empty"));
        }
        if service.len() != header.service.len() {
            header.service = service.to_owned();
        }
        Ok(header)
    }

    /// Correlation id echoed back in error replies; `null` when absent.
    #[must_use]
    pub const fn id(&self) -> &Value {
        &self.id
    }

    /// Logical service the request targets.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Optional action name, logged for diagnostics.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }
}

/// Best-effort extraction of the correlation id from a raw frame.
///
/// Used when the frame could not be parsed as a request. Yields `null` when
/// no id can be recovered.
#[must_use]
pub fn correlation_of(body: &[u8]) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("id").cloned())
        .unwrap_or(Value::Null)
}

fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    bytes.get(..end).unwrap_or_default()
}
