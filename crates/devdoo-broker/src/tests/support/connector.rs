//! Scripted [`BackendConnector`] that records connections and forwarded frames.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Value, json};

use devdoo_config::SocketEndpoint;

use crate::backends::{BackendChannel, BackendConnectError, BackendConnector};
use crate::topology::ServiceDescriptor;
use crate::transport::TransportError;

#[derive(Debug, Default)]
struct ConnectorState {
    connects: Vec<SocketEndpoint>,
    forwarded: Vec<(SocketEndpoint, Vec<u8>)>,
    refused: HashSet<SocketEndpoint>,
    failing: HashSet<SocketEndpoint>,
}

/// Connector whose channels answer every request with
/// `{"endpoint": "<backend>", "request": <forwarded frame>}`.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl ScriptedConnector {
    fn state(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().expect("connector mutex poisoned")
    }

    /// Refuses connections to `endpoint`.
    pub fn refuse(&self, endpoint: SocketEndpoint) {
        self.state().refused.insert(endpoint);
    }

    /// Fails exchanges on `endpoint` until [`ScriptedConnector::recover`].
    pub fn fail_exchanges(&self, endpoint: SocketEndpoint) {
        self.state().failing.insert(endpoint);
    }

    pub fn recover(&self, endpoint: &SocketEndpoint) {
        self.state().failing.remove(endpoint);
    }

    /// Endpoints connected to, in order.
    pub fn connects(&self) -> Vec<SocketEndpoint> {
        self.state().connects.clone()
    }

    /// Frames forwarded to backends, decoded as JSON.
    pub fn forwarded(&self) -> Vec<Value> {
        self.state()
            .forwarded
            .iter()
            .map(|(_, frame)| serde_json::from_slice(frame).expect("forwarded frames are JSON"))
            .collect()
    }
}

impl BackendConnector for ScriptedConnector {
    type Channel = ScriptedChannel;

    fn connect(&self, service: &ServiceDescriptor) -> Result<Self::Channel, BackendConnectError> {
        let endpoint = service.backend_endpoint().clone();
        let mut state = self.state();
        state.connects.push(endpoint.clone());
        if state.refused.contains(&endpoint) {
            return Err(BackendConnectError::new(service, "connection refused"));
        }
        Ok(ScriptedChannel {
            endpoint,
            state: Arc::clone(&self.state),
            last_request: None,
        })
    }
}

#[derive(Debug)]
pub struct ScriptedChannel {
    endpoint: SocketEndpoint,
    state: Arc<Mutex<ConnectorState>>,
    last_request: Option<Vec<u8>>,
}

impl BackendChannel for ScriptedChannel {
    fn send(&mut self, request: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("connector mutex poisoned");
        state.forwarded.push((self.endpoint.clone(), request.to_vec()));
        if state.failing.contains(&self.endpoint) {
            return Err(TransportError::TimedOut { timeout_ms: 10 });
        }
        self.last_request = Some(request.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let raw = self.last_request.take().ok_or(TransportError::Closed)?;
        let request: Value = serde_json::from_slice(&raw).unwrap_or(Value::Null);
        let reply = json!({
            "endpoint": self.endpoint.to_string(),
            "request": request,
        });
        Ok(reply.to_string().into_bytes())
    }
}
