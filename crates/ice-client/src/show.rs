//! Materializes a live rule tree into its display form.

use std::collections::HashSet;

use ice_protocol::{NodeConf, ShowConf, ShowNode};
use thiserror::Error;

use crate::graph::{Node, NodeGraph};

/// Failure to materialize a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShowError {
    /// The walk reached a node that is already on the current path.
    #[error("cycle detected at node {node_id}")]
    Cycle {
        /// Id of the node that closed the loop.
        node_id: i64,
    },
}

/// Builds the `SHOW_CONF` answer for `conf_id` rooted at `root`.
///
/// `root` is `None` when the client holds no such configuration; the view
/// then carries only the address and id.
///
/// # Errors
///
/// Returns [`ShowError::Cycle`] when the graph loops back on itself.
pub fn show_conf(
    graph: &NodeGraph,
    root: Option<i64>,
    address: &str,
    conf_id: i64,
) -> Result<ShowConf, ShowError> {
    let root = match root {
        Some(root) => materialize(graph, root)?,
        None => None,
    };
    Ok(ShowConf {
        address: address.to_owned(),
        conf_id,
        root,
    })
}

/// Materializes the tree below `node_id`. A missing node yields `None`.
///
/// A node reachable by two paths appears once per path.
///
/// # Errors
///
/// Returns [`ShowError::Cycle`] when a node is revisited on one path.
pub fn materialize(graph: &NodeGraph, node_id: i64) -> Result<Option<ShowNode>, ShowError> {
    Walk {
        graph,
        path: HashSet::new(),
    }
    .visit(node_id)
}

struct Walk<'g> {
    graph: &'g NodeGraph,
    path: HashSet<i64>,
}

impl Walk<'_> {
    fn visit(&mut self, node_id: i64) -> Result<Option<ShowNode>, ShowError> {
        let Some(node) = self.graph.get(node_id) else {
            return Ok(None);
        };
        if !self.path.insert(node_id) {
            return Err(ShowError::Cycle { node_id });
        }
        let mut shown = display_fields(node);

        let children = node.children();
        if !children.is_empty() {
            let mut visible = Vec::with_capacity(children.len());
            for &child in children {
                if let Some(child) = self.visit(child)? {
                    visible.push(child);
                }
            }
            shown.children = Some(visible);
        }
        if let Some(forward) = node.base.forward {
            shown.forward = self.visit(forward)?.map(Box::new);
        }

        self.path.remove(&node_id);
        Ok(Some(shown))
    }
}

fn display_fields(node: &Node) -> ShowNode {
    let base = &node.base;
    ShowNode {
        show_conf: NodeConf {
            node_id: base.node_id,
            debug: (!base.debug).then_some(false),
            inverse: base.inverse.then_some(true),
        },
        time_type: base.time_type.as_byte(),
        start: (base.start != 0).then_some(base.start),
        end: (base.end != 0).then_some(base.end),
        children: None,
        forward: None,
    }
}
