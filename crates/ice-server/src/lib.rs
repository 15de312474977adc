//! Server side of the ice control-plane bridge.
//!
//! Clients of each application connect over a persistent socket, announce
//! themselves with `INIT` and keep their registration alive with `SLAP`
//! heartbeats. The [`ClientManager`] uses those registrations to run four
//! operations against the fleet:
//!
//! - class compatibility checks on one client,
//! - configuration releases fanned out to every client of an app,
//! - rule-tree snapshots from a chosen client,
//! - mock evaluations on one client.
//!
//! Correlated calls are matched to responses by envelope id and bounded by
//! the configured response timeout. Releases are fire-and-forget and run on
//! a bounded pool that falls back to the calling thread when saturated.
//!
//! [`IceServer`] wires the listener, the stale-client reaper and the
//! manager together; [`run_server`] adds configuration loading, telemetry
//! and signal-driven shutdown for the `ice-server` binary.

mod bootstrap;
mod channel;
mod clock;
mod correlation;
mod errors;
mod health;
mod manager;
mod reaper;
mod registry;
mod release;
mod server;
mod shutdown;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Bootstrapped, ConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use channel::{ChannelId, ClientChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use correlation::PendingRequests;
pub use errors::{ClientError, ErrorCode};
pub use health::{HealthReporter, Lifecycle, LogHealthReporter};
pub use manager::ClientManager;
pub use reaper::{Reaper, sweep};
pub use registry::{ChannelInfo, ClientRegistry, Reaped, Registration};
pub use release::{Dispatch, ReleasePool, Task};
pub use server::{IceServer, ServerError, run_server, run_server_with};
pub use shutdown::{
    ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal, TriggeredShutdown,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
