//! Payload records owned by collaborators outside the bridge.
//!
//! The bridge moves these between server and client without interpreting
//! them beyond their shape: transfer DTOs are applied by the client's update
//! logic, packs are evaluated by the rule engine, and contexts are what the
//! engine returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of a class compatibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClazzCheck {
    /// `1` when the class exists and satisfies the node type, `0` otherwise.
    pub code: u8,
    /// Human-readable reason for a failed check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ClazzCheck {
    /// A passing check.
    #[must_use]
    pub const fn passed() -> Self {
        Self {
            code: 1,
            message: None,
        }
    }

    /// A failing check with an explanation.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            code: 0,
            message: Some(message.into()),
        }
    }

    /// Returns `true` for a passing check.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code == 1
    }
}

/// Configuration delta released by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferDto {
    /// Monotonic version of the app's configuration.
    pub version: i64,
    /// Configurations to insert or replace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_or_update_confs: Vec<Value>,
    /// Configuration ids to delete.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_conf_ids: Vec<i64>,
    /// Base records to insert or replace.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_or_update_bases: Vec<Value>,
    /// Base ids to delete.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete_base_ids: Vec<i64>,
}

/// Request packet evaluated by the rule engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    /// Entry id selecting a rule tree.
    #[serde(default)]
    pub ice_id: i64,
    /// Scene name selecting rule trees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<String>,
    /// Configuration id selecting a rule tree directly.
    #[serde(default)]
    pub conf_id: i64,
    /// Input data visible to the rule tree.
    #[serde(default)]
    pub roam: Map<String, Value>,
    /// Request time in epoch milliseconds.
    #[serde(default)]
    pub request_time: i64,
    /// Trace id propagated into process logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Debug flags for the evaluation.
    #[serde(default)]
    pub debug: u8,
}

/// Result of evaluating a pack against one rule tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Rule tree that produced this context.
    pub ice_id: i64,
    /// The evaluated pack, including any roam mutations.
    pub pack: Pack,
    /// Engine trace of visited nodes.
    #[serde(default)]
    pub process_info: String,
}
