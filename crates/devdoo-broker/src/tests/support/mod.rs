//! Shared fakes for broker tests.

mod connector;
mod frontend;
mod reporter;
mod world;

pub use connector::ScriptedConnector;
pub use frontend::MemoryFrontend;
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{RouterWorld, backend};
