//! In-memory [`InboundSocket`] that scripts inbound traffic and records replies.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use serde_json::Value;

use crate::dispatch::{ClientEnvelope, ClientId, DispatchError};
use crate::transport::{InboundEvent, InboundSocket, TransportError};

#[derive(Debug, Default)]
pub struct MemoryFrontend {
    inbound: VecDeque<InboundEvent>,
    sent: Vec<(ClientId, Vec<u8>)>,
    disconnected: Vec<ClientId>,
    polls: Vec<Duration>,
    vanished: HashSet<ClientId>,
}

impl MemoryFrontend {
    /// Queues a request frame from `client`.
    pub fn push_request(&mut self, client: u64, body: impl Into<Vec<u8>>) {
        self.inbound.push_back(InboundEvent::Request(ClientEnvelope::new(
            ClientId::new(client),
            body,
        )));
    }

    /// Queues a frame the transport refused.
    pub fn push_rejection(&mut self, client: u64, error: DispatchError) {
        self.inbound.push_back(InboundEvent::Rejected {
            client: ClientId::new(client),
            error,
        });
    }

    /// Makes later replies to `client` fail as undeliverable.
    pub fn vanish(&mut self, client: u64) {
        self.vanished.insert(ClientId::new(client));
    }

    /// Client identities of delivered replies, in delivery order.
    pub fn reply_order(&self) -> Vec<u64> {
        self.sent.iter().map(|(client, _)| client.get()).collect()
    }

    /// Delivered replies for `client`, decoded as JSON.
    pub fn replies_for(&self, client: u64) -> Vec<Value> {
        self.sent
            .iter()
            .filter(|(id, _)| id.get() == client)
            .map(|(_, frame)| serde_json::from_slice(frame).expect("reply frames are JSON"))
            .collect()
    }

    /// The single reply delivered to `client`.
    pub fn only_reply(&self, client: u64) -> Value {
        let mut replies = self.replies_for(client);
        assert_eq!(replies.len(), 1, "expected one reply for client {client}");
        replies.remove(0)
    }

    pub fn disconnected(&self) -> &[ClientId] {
        &self.disconnected
    }

    /// Takes the timeouts passed to every poll since the last call.
    pub fn take_polls(&mut self) -> Vec<Duration> {
        std::mem::take(&mut self.polls)
    }
}

impl InboundSocket for MemoryFrontend {
    fn poll_event(&mut self, timeout: Duration) -> Option<InboundEvent> {
        self.polls.push(timeout);
        self.inbound.pop_front()
    }

    fn send(&mut self, client: ClientId, frame: &[u8]) -> Result<(), TransportError> {
        if self.vanished.contains(&client) {
            return Err(TransportError::UnknownClient { client });
        }
        self.sent.push((client, frame.to_vec()));
        Ok(())
    }

    fn disconnect(&mut self, client: ClientId) {
        self.disconnected.push(client);
    }
}
