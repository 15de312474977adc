//! `ice-server` binary: serves ice clients until a termination signal.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use tracing::error;

const MAIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::main");

fn main() -> ExitCode {
    match ice_server::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(server_error) => {
            report(&server_error);
            ExitCode::FAILURE
        }
    }
}

/// Failures before telemetry is configured still reach stderr through a
/// plain subscriber.
fn report(server_error: &ice_server::ServerError) {
    if !tracing::dispatcher::has_been_set()
        && tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_target(true)
            .try_init()
            .is_err()
    {
        return;
    }
    error!(target: MAIN_TARGET, error = %server_error, "ice-server failed");
}
