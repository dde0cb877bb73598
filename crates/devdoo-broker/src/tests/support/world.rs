//! BDD world wiring a router loop to in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use devdoo_config::SocketEndpoint;
use serde_json::json;

use crate::broker::Broker;
use crate::registry::ServiceRegistry;
use crate::router::{RouterLoop, RouterSettings, TurnSummary};
use crate::topology::{BrokerConfig, BrokerKind, ServiceDescriptor};

use super::{MemoryFrontend, RecordingHealthReporter, ScriptedConnector};

pub type TestRouter = RouterLoop<MemoryFrontend, ScriptedConnector>;

/// Scenario world shared across router steps.
pub struct RouterWorld {
    config: BrokerConfig,
    settings: RouterSettings,
    pub connector: ScriptedConnector,
    pub reporter: Arc<RecordingHealthReporter>,
    router: Option<TestRouter>,
    summaries: Vec<TurnSummary>,
}

impl RouterWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: BrokerConfig::new(
                "broker-test",
                SocketEndpoint::tcp("127.0.0.1", 0),
                BrokerKind::Leaf,
            ),
            settings: RouterSettings {
                request_ttl: Duration::from_secs(5),
                idle_poll: Duration::from_millis(250),
            },
            connector: ScriptedConnector::default(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            router: None,
            summaries: Vec::new(),
        }
    }

    /// Registers `service_id` on a backend at `127.0.0.1:port`.
    pub fn add_service(&mut self, service_id: &str, port: u16) {
        assert!(self.router.is_none(), "services must be added before traffic");
        let config = self.config.clone();
        self.config = config.with_service(ServiceDescriptor::new(service_id, backend(port)));
    }

    pub fn set_request_ttl(&mut self, ttl: Duration) {
        assert!(self.router.is_none(), "ttl must be set before traffic");
        self.settings.request_ttl = ttl;
    }

    /// Router under test, built on first use.
    pub fn router(&mut self) -> &mut TestRouter {
        let Self {
            config,
            settings,
            connector,
            reporter,
            router,
            ..
        } = self;
        router.get_or_insert_with(|| {
            let registry = ServiceRegistry::from_config(config).expect("valid test registry");
            let broker = Broker::new(registry, connector.clone(), reporter.clone());
            RouterLoop::new(MemoryFrontend::default(), broker, *settings, reporter.clone())
        })
    }

    /// Submits a request for `service_id` from `client`, tagged `req-<client>`.
    pub fn submit(&mut self, client: u64, service_id: &str) {
        let body = json!({
            "id": format!("req-{client}"),
            "service": service_id,
            "action": "echo",
            "payload": { "client": client },
        });
        self.router()
            .frontend_mut()
            .push_request(client, body.to_string());
    }

    pub fn run_turns(&mut self, turns: usize) {
        for _ in 0..turns {
            let summary = self.router().turn();
            self.summaries.push(summary);
        }
    }

    pub fn frontend(&mut self) -> &MemoryFrontend {
        self.router().frontend()
    }

    pub fn summaries(&self) -> &[TurnSummary] {
        &self.summaries
    }
}

pub fn backend(port: u16) -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", port)
}
