//! FIFO queue of requests waiting for dispatch.
//!
//! Every request is stamped with a deadline when it is enqueued. Requests
//! leave the queue either in arrival order through [`RequestQueue::dequeue_next`]
//! or, once their deadline passes, through [`RequestQueue::sweep_expired`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::dispatch::{ClientEnvelope, ClientId, DispatchError, RequestHeader, correlation_of};

/// A request accepted into the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    sequence: u64,
    header: RequestHeader,
    envelope: ClientEnvelope,
    enqueued_at: Instant,
    deadline: Instant,
}

impl PendingRequest {
    /// Arrival order within the queue.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Identity of the client awaiting the reply.
    #[must_use]
    pub const fn client(&self) -> ClientId {
        self.envelope.client()
    }

    /// Service the request is routed to.
    #[must_use]
    pub fn service_id(&self) -> &str {
        self.header.service()
    }

    /// Action named by the request, if any.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.header.action()
    }

    /// Request id echoed in error replies.
    #[must_use]
    pub const fn correlation(&self) -> &Value {
        self.header.id()
    }

    /// Original frame, forwarded to the backend unchanged.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.envelope.body()
    }

    /// When the request entered the queue.
    #[must_use]
    pub const fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Instant at which the request expires.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether the deadline has been reached at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}

/// A frame the queue refused, with the error to report to its sender.
#[derive(Debug)]
pub struct RejectedRequest {
    /// Sender of the frame.
    pub client: ClientId,
    /// Request id recovered from the frame, or `null`.
    pub correlation: Value,
    /// Why the frame was refused.
    pub error: DispatchError,
}

/// Arrival-ordered request queue with per-request deadlines.
#[derive(Debug)]
pub struct RequestQueue {
    entries: VecDeque<PendingRequest>,
    next_sequence: u64,
    idle_poll: Duration,
}

impl RequestQueue {
    /// Creates an empty queue whose idle wait is capped at `idle_poll`.
    #[must_use]
    pub const fn new(idle_poll: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence: 0,
            idle_poll,
        }
    }

    /// Parses `envelope` and appends it with deadline `now + ttl`.
    ///
    /// A zero `ttl` yields a request that is already expired and is removed
    /// by the next sweep unless dispatched first.
    ///
    /// # Errors
    ///
    /// Returns the rejected frame when it is not a well-formed request.
    pub fn enqueue(
        &mut self,
        envelope: ClientEnvelope,
        now: Instant,
        ttl: Duration,
    ) -> Result<u64, Box<RejectedRequest>> {
        let header = match RequestHeader::parse(envelope.body()) {
            Ok(header) => header,
            Err(error) => {
                return Err(Box::new(RejectedRequest {
                    client: envelope.client(),
                    correlation: correlation_of(envelope.body()),
                    error,
                }));
            }
        };
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.push_back(PendingRequest {
            sequence,
            header,
            envelope,
            enqueued_at: now,
            deadline: now + ttl,
        });
        Ok(sequence)
    }

    /// Whether a request is waiting for dispatch.
    #[must_use]
    pub fn has_ready(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Removes the oldest request.
    ///
    /// Callers sweep expired requests first so the head is still live.
    pub fn dequeue_next(&mut self) -> Option<PendingRequest> {
        self.entries.pop_front()
    }

    /// Removes every request whose deadline is at or before `now`.
    ///
    /// Expired requests are returned in arrival order; survivors keep their
    /// relative order.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<PendingRequest> {
        if !self.entries.iter().any(|pending| pending.is_expired(now)) {
            return Vec::new();
        }
        let (expired, live): (Vec<_>, Vec<_>) = self
            .entries
            .drain(..)
            .partition(|pending| pending.is_expired(now));
        self.entries = live.into();
        expired
    }

    /// How long the loop may wait for input before the next deadline.
    ///
    /// The wait never exceeds the idle poll interval, and is zero once a
    /// deadline has already passed.
    #[must_use]
    pub fn next_deadline_delta(&self, now: Instant) -> Duration {
        self.entries
            .iter()
            .map(PendingRequest::deadline)
            .min()
            .map_or(self.idle_poll, |deadline| {
                deadline.saturating_duration_since(now).min(self.idle_poll)
            })
    }

    /// Removes every queued request in arrival order.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        self.entries.drain(..).collect()
    }

    /// Number of queued requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates queued requests in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter()
    }
}
