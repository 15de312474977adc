//! Behaviour suites for the client.

pub(crate) mod support;
