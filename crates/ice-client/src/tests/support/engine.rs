//! In-memory rule engine for exercising the client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ice_protocol::{Context, Pack, TransferDto};

use crate::engine::{ClientEngine, ConfView};
use crate::graph::NodeGraph;

/// Serves configurations from a map and records applied updates.
#[derive(Debug, Default)]
pub(crate) struct MemoryEngine {
    confs: Mutex<HashMap<i64, ConfView>>,
    updates: Mutex<Vec<TransferDto>>,
    update_errors: Mutex<Vec<String>>,
}

impl MemoryEngine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn insert_conf(&self, conf_id: i64, graph: NodeGraph, root: i64) {
        self.confs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                conf_id,
                ConfView {
                    graph: Arc::new(graph),
                    root,
                },
            );
    }

    /// Makes every later update report `messages`.
    pub(crate) fn fail_updates_with(&self, messages: &[&str]) {
        *self
            .update_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner) =
            messages.iter().map(|message| (*message).to_owned()).collect();
    }

    pub(crate) fn updates(&self) -> Vec<TransferDto> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClientEngine for MemoryEngine {
    fn conf(&self, conf_id: i64) -> Option<ConfView> {
        self.confs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&conf_id)
            .cloned()
    }

    fn process(&self, pack: &Pack) -> Vec<Context> {
        vec![Context {
            ice_id: pack.ice_id,
            pack: pack.clone(),
            process_info: format!("[{}:mock]", pack.ice_id),
        }]
    }

    fn update(&self, dto: &TransferDto) -> Vec<String> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dto.clone());
        self.update_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
