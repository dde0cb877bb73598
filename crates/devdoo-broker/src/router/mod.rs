//! Single-threaded router loop.
//!
//! Each turn answers requests that expired since the last one, dispatches at
//! most one queued request, waits for inbound traffic no longer than the
//! nearest deadline allows, then answers expired requests again. All broker
//! state is owned by the loop, so no locking is needed.
//!
//! ```text
//!   Idle ──(request queued)──► Dispatching ──► WaitingForInbound ──┐
//!    ▲                                                              │
//!    └──────────────(queue empty after sweep)───────────────────────┘
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use devdoo_config::Config;

use crate::backends::{BackendChannel, BackendConnector};
use crate::broker::Broker;
use crate::dispatch::{ClientId, DispatchError, ReplyMessage};
use crate::health::HealthReporter;
use crate::queue::{PendingRequest, RejectedRequest, RequestQueue};
use crate::transport::{InboundEvent, InboundSocket};

const ROUTER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::router");

/// Timing knobs for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterSettings {
    /// Lifetime of a queued request.
    pub request_ttl: Duration,
    /// Upper bound on one wait for inbound traffic.
    pub idle_poll: Duration,
}

impl RouterSettings {
    /// Reads the request lifetime and idle poll interval from `config`.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            request_ttl: config.request_ttl(),
            idle_poll: config.idle_poll(),
        }
    }
}

/// Where the loop is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Nothing queued.
    Idle,
    /// Forwarding the head of the queue to its backend.
    Dispatching,
    /// Waiting for inbound traffic.
    WaitingForInbound,
}

/// What happened during one turn.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TurnSummary {
    /// Whether a queued request was taken for dispatch.
    pub dispatched: bool,
    /// Number of inbound events handled.
    pub received: usize,
    /// Number of requests answered with a timeout.
    pub expired: usize,
}

/// The broker's event loop.
pub struct RouterLoop<F, C>
where
    C: BackendConnector,
{
    frontend: F,
    broker: Broker<C>,
    queue: RequestQueue,
    settings: RouterSettings,
    reporter: Arc<dyn HealthReporter>,
    state: LoopState,
    shutdown: Arc<AtomicBool>,
}

impl<F, C> RouterLoop<F, C>
where
    F: InboundSocket,
    C: BackendConnector,
{
    /// Builds an idle loop that receives on `frontend` and routes through
    /// `broker`.
    #[must_use]
    pub fn new(
        frontend: F,
        broker: Broker<C>,
        settings: RouterSettings,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            frontend,
            broker,
            queue: RequestQueue::new(settings.idle_poll),
            settings,
            reporter,
            state: LoopState::Idle,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops [`RouterLoop::run`] once set.
    #[must_use]
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Current position within the turn.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Requests waiting for dispatch.
    #[must_use]
    pub const fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Inbound socket the loop receives on.
    #[must_use]
    pub const fn frontend(&self) -> &F {
        &self.frontend
    }

    /// Mutable access to the inbound socket.
    pub const fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    /// Service resolution and backend connections.
    #[must_use]
    pub const fn broker(&self) -> &Broker<C> {
        &self.broker
    }

    /// Runs turns until the shutdown flag is set, then answers everything
    /// still queued with a shutdown timeout.
    pub fn run(&mut self) {
        info!(target: ROUTER_TARGET, "router loop started");
        while !self.shutdown.load(Ordering::SeqCst) {
            self.turn();
        }
        let abandoned = self.drain_on_shutdown();
        info!(
            target: ROUTER_TARGET,
            abandoned,
            "router loop stopped"
        );
    }

    /// Runs one iteration of the loop.
    pub fn turn(&mut self) -> TurnSummary {
        let mut summary = TurnSummary {
            expired: self.sweep(Instant::now()),
            ..TurnSummary::default()
        };

        if let Some(request) = self.queue.dequeue_next() {
            self.transition(LoopState::Dispatching);
            self.dispatch(&request);
            summary.dispatched = true;
        }

        let timeout = if self.queue.has_ready() {
            Duration::ZERO
        } else {
            self.queue.next_deadline_delta(Instant::now())
        };
        self.transition(LoopState::WaitingForInbound);
        if let Some(first) = self.frontend.poll_event(timeout) {
            self.accept(first, Instant::now());
            summary.received = 1;
            // Drain whatever else is already waiting so deadlines start on arrival.
            while let Some(event) = self.frontend.poll_event(Duration::ZERO) {
                self.accept(event, Instant::now());
                summary.received += 1;
            }
        }

        summary.expired += self.sweep(Instant::now());
        if self.queue.is_empty() {
            self.transition(LoopState::Idle);
        }
        summary
    }

    fn accept(&mut self, event: InboundEvent, now: Instant) {
        match event {
            InboundEvent::Request(envelope) => {
                let client = envelope.client();
                match self.queue.enqueue(envelope, now, self.settings.request_ttl) {
                    Ok(sequence) => {
                        debug!(
                            target: ROUTER_TARGET,
                            %client,
                            sequence,
                            queued = self.queue.len(),
                            "request queued"
                        );
                    }
                    Err(rejected) => {
                        let RejectedRequest {
                            correlation, error, ..
                        } = *rejected;
                        debug!(
                            target: ROUTER_TARGET,
                            %client,
                            error = %error,
                            "request rejected"
                        );
                        self.reply_error(client, correlation, &error);
                    }
                }
            }
            InboundEvent::Rejected { client, error } => {
                self.reply_error(client, Value::Null, &error);
                self.frontend.disconnect(client);
            }
        }
    }

    fn dispatch(&mut self, request: &PendingRequest) {
        let outcome = self
            .broker
            .resolve(request)
            .map_err(DispatchError::from)
            .and_then(|channel| {
                channel
                    .round_trip(request.body())
                    .map_err(|error| DispatchError::transport(request.service_id(), error))
            });
        match outcome {
            Ok(reply) => {
                debug!(
                    target: ROUTER_TARGET,
                    client = %request.client(),
                    service = %request.service_id(),
                    action = request.action().unwrap_or_default(),
                    "request dispatched"
                );
                self.deliver(&ReplyMessage::backend(request.client(), reply));
            }
            Err(error) => {
                if let DispatchError::Transport { service_id, source } = &error {
                    self.reporter.backend_exchange_failed(service_id, source);
                    self.broker.discard_connection(service_id);
                }
                self.reply_error(request.client(), request.correlation().clone(), &error);
            }
        }
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let expired = self.queue.sweep_expired(now);
        let count = expired.len();
        for request in expired {
            self.reporter.request_expired(&request);
            let waited = now.saturating_duration_since(request.enqueued_at());
            self.reply_error(
                request.client(),
                request.correlation().clone(),
                &DispatchError::timeout(waited),
            );
        }
        count
    }

    fn drain_on_shutdown(&mut self) -> usize {
        let pending = self.queue.drain();
        let count = pending.len();
        for request in pending {
            self.reply_error(
                request.client(),
                request.correlation().clone(),
                &DispatchError::ShuttingDown,
            );
        }
        self.transition(LoopState::Idle);
        count
    }

    fn reply_error(&mut self, client: ClientId, ack: Value, error: &DispatchError) {
        self.deliver(&ReplyMessage::error(client, ack, error));
    }

    fn deliver(&mut self, reply: &ReplyMessage) {
        let frame = match reply.encode() {
            Ok(frame) => frame,
            Err(error) => {
                warn!(
                    target: ROUTER_TARGET,
                    client = %reply.client(),
                    error = %error,
                    "failed to encode reply"
                );
                return;
            }
        };
        if let Err(error) = self.frontend.send(reply.client(), &frame) {
            self.reporter.reply_undeliverable(reply.client(), &error);
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            trace!(
                target: ROUTER_TARGET,
                from = ?self.state,
                to = ?next,
                "router state change"
            );
            self.state = next;
        }
    }
}
