//! Seam between the bridge and the embedding rule engine.

use std::sync::Arc;

use ice_protocol::{Context, Pack, TransferDto};

use crate::graph::NodeGraph;

/// An instantiated configuration: the node arena and its root.
#[derive(Debug, Clone)]
pub struct ConfView {
    /// Every node of the configuration.
    pub graph: Arc<NodeGraph>,
    /// Id of the node evaluation starts from.
    pub root: i64,
}

/// Operations the bridge delegates to the client's rule engine.
pub trait ClientEngine: Send + Sync {
    /// Instantiated tree for `conf_id`, if the client holds one.
    fn conf(&self, conf_id: i64) -> Option<ConfView>;

    /// Evaluates `pack`, returning one context per matched rule tree.
    fn process(&self, pack: &Pack) -> Vec<Context>;

    /// Applies a released configuration delta. Returns the errors hit while
    /// applying; an empty list means a clean apply.
    fn update(&self, dto: &TransferDto) -> Vec<String>;
}

impl<T: ClientEngine + ?Sized> ClientEngine for Arc<T> {
    fn conf(&self, conf_id: i64) -> Option<ConfView> {
        (**self).conf(conf_id)
    }

    fn process(&self, pack: &Pack) -> Vec<Context> {
        (**self).process(pack)
    }

    fn update(&self, dto: &TransferDto) -> Vec<String> {
        (**self).update(dto)
    }
}
