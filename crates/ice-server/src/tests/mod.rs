//! Behaviour suites for the server.

mod correlation_behaviour;
pub(crate) mod support;
