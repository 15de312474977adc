//! Client side of the ice control-plane bridge.
//!
//! An application embedding the rule engine connects to the ice server with
//! [`IceClient::connect`], registers under its app id and address, and then
//! answers whatever the server asks:
//!
//! - `CLAZZ_CHECK` is resolved against a [`TypeLoader`] by [`check_clazz`];
//! - `SHOW_CONF` walks the engine's [`NodeGraph`] into a display tree;
//! - `MOCK` and `UPDATE` are handed to the embedding [`ClientEngine`].
//!
//! The engine and the class loader are supplied by the application; this
//! crate owns only the wire-facing half.

mod clazz;
mod engine;
mod errors;
mod graph;
mod runtime;
mod service;
mod show;

pub use clazz::{Capability, ClassInfo, ClassRegistry, TypeLoadError, TypeLoader, check_clazz};
pub use engine::{ClientEngine, ConfView};
pub use errors::ConnectError;
pub use graph::{LeafKind, Node, NodeBase, NodeGraph, NodeKind, RelationKind};
pub use runtime::{ClientConfig, ClientStream, IceClient};
pub use service::ClientService;
pub use show::{ShowError, materialize, show_conf};

#[cfg(test)]
mod tests;
