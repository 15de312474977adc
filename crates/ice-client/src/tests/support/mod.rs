//! Shared fixtures for the client's unit and behavioural tests.

mod engine;

pub(crate) use engine::MemoryEngine;
