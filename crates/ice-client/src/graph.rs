//! Arena holding a client's instantiated rule nodes.
//!
//! Nodes refer to each other by id. A child or forward id with no node in
//! the arena reads as "no node", which is how a half-applied update looks
//! from the outside.

use std::collections::HashMap;

use ice_protocol::{NodeType, TimeType};

/// Relation flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// Shown as `ALL`.
    All,
    /// Shown as `AND`.
    And,
    /// Shown as `NONE`.
    None,
    /// Shown as `TRUE`.
    True,
    /// Shown as `ANY`.
    Any,
}

/// Leaf flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    /// Shown as `LEAF_FLOW`.
    Flow,
    /// Shown as `LEAF_NONE`.
    None,
    /// Shown as `LEAF_RESULT`.
    Result,
}

/// Settings shared by every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeBase {
    /// Id unique within the configuration.
    pub node_id: i64,
    /// How `start` and `end` gate the node.
    pub time_type: TimeType,
    /// Window start in epoch milliseconds; `0` when unset.
    pub start: i64,
    /// Window end in epoch milliseconds; `0` when unset.
    pub end: i64,
    /// Whether the node shows up in process traces.
    pub debug: bool,
    /// Whether the node's outcome is negated.
    pub inverse: bool,
    /// Node evaluated before this one.
    pub forward: Option<i64>,
}

/// Relation or leaf payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Combines the outcomes of its children.
    Relation {
        /// Combination rule.
        kind: RelationKind,
        /// Child ids in evaluation order.
        children: Vec<i64>,
    },
    /// Runs user code.
    Leaf(LeafKind),
}

/// One instantiated node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Settings common to every kind.
    pub base: NodeBase,
    /// Relation or leaf specifics.
    pub kind: NodeKind,
}

impl Node {
    fn with_kind(node_id: i64, kind: NodeKind) -> Self {
        Self {
            base: NodeBase {
                node_id,
                time_type: TimeType::None,
                start: 0,
                end: 0,
                debug: true,
                inverse: false,
                forward: None,
            },
            kind,
        }
    }

    /// A leaf with default settings: always active, debugging on.
    #[must_use]
    pub fn leaf(node_id: i64, kind: LeafKind) -> Self {
        Self::with_kind(node_id, NodeKind::Leaf(kind))
    }

    /// A relation over `children`, in order.
    #[must_use]
    pub fn relation(node_id: i64, kind: RelationKind, children: Vec<i64>) -> Self {
        Self::with_kind(node_id, NodeKind::Relation { kind, children })
    }

    /// Sets the node evaluated before this one.
    #[must_use]
    pub fn with_forward(mut self, forward: i64) -> Self {
        self.base.forward = Some(forward);
        self
    }

    /// Restricts the node to a time window.
    #[must_use]
    pub fn with_window(mut self, time_type: TimeType, start: i64, end: i64) -> Self {
        self.base.time_type = time_type;
        self.base.start = start;
        self.base.end = end;
        self
    }

    /// Toggles process tracing for this node.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.base.debug = debug;
        self
    }

    /// Negates the node's outcome.
    #[must_use]
    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.base.inverse = inverse;
        self
    }

    /// The node id.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.base.node_id
    }

    /// Child ids; empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[i64] {
        match &self.kind {
            NodeKind::Relation { children, .. } => children,
            NodeKind::Leaf(_) => &[],
        }
    }

    /// Wire tag of this node's kind.
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match &self.kind {
            NodeKind::Relation { kind, .. } => match kind {
                RelationKind::All => NodeType::All,
                RelationKind::And => NodeType::And,
                RelationKind::None => NodeType::None,
                RelationKind::True => NodeType::True,
                RelationKind::Any => NodeType::Any,
            },
            NodeKind::Leaf(kind) => match kind {
                LeafKind::Flow => NodeType::LeafFlow,
                LeafKind::None => NodeType::LeafNone,
                LeafKind::Result => NodeType::LeafResult,
            },
        }
    }
}

/// Nodes keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeGraph {
    nodes: HashMap<i64, Node>,
}

impl NodeGraph {
    /// An empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node`, returning the node it replaced.
    pub fn insert(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id(), node)
    }

    /// Removes and returns the node with `node_id`.
    pub fn remove(&mut self, node_id: i64) -> Option<Node> {
        self.nodes.remove(&node_id)
    }

    /// The node with `node_id`, if present.
    #[must_use]
    pub fn get(&self, node_id: i64) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Mutable access to the node with `node_id`.
    pub fn get_mut(&mut self, node_id: i64) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Number of nodes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<Node> for NodeGraph {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(|node| (node.id(), node)).collect(),
        }
    }
}
