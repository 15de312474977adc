//! Display tree returned by `SHOW_CONF`.
//!
//! A [`ShowNode`] mirrors one live node of a client's rule tree. Optional
//! fields are omitted from the encoding when absent, so the tree stays small
//! and readable. Two fields use a deliberately lopsided encoding that callers
//! rely on:
//!
//! - `debug` is `None` when the live node has debugging enabled and
//!   `Some(false)` when it does not.
//! - `inverse` is `Some(true)` when the live node inverts its result and
//!   `None` otherwise.
//!
//! `start` and `end` are `None` when the live value is `0`.

use serde::{Deserialize, Serialize};

/// Materialized view of one configuration on one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowConf {
    /// Address of the client that produced the view.
    pub address: String,
    /// Root configuration id that was requested.
    pub conf_id: i64,
    /// Root of the tree; absent when the client holds no such configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<ShowNode>,
}

/// Per-node settings carried in a [`ShowNode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConf {
    /// Node id.
    pub node_id: i64,
    /// `None` when debugging is on, `Some(false)` when off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    /// `Some(true)` when the node inverts its result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<bool>,
}

/// One node of the display tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowNode {
    /// Node settings.
    pub show_conf: NodeConf,
    /// Time window tag, see [`crate::TimeType`].
    pub time_type: u8,
    /// Window start in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Window end in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
    /// Children of a relation, in evaluation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ShowNode>>,
    /// Node evaluated before this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<Box<ShowNode>>,
}

impl ShowNode {
    /// Node id of this display node.
    #[must_use]
    pub const fn node_id(&self) -> i64 {
        self.show_conf.node_id
    }

    /// Children, or an empty slice for leaves and childless relations.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        self.children.as_deref().unwrap_or_default()
    }
}
