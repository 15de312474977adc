//! Test doubles shared by the server's unit and behaviour suites.

mod channel;
mod config_loader;
mod reporter;

pub use channel::{RecordingChannel, SendHook};
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use reporter::{Milestone, RecordingHealthReporter};
