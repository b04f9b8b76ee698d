// src/workflow/flow.rs

//! The persisted workflow graph payload.
//!
//! ```json
//! {
//!   "nodes": [{ "id": "a", "data": { "taskId": 1, "nodeType": "task" } }],
//!   "edges": [{ "id": "e1", "source": "a", "target": "b", "sourceHandle": "success" }]
//! }
//! ```
//!
//! Fields the graph editor leaves as `null` are read as their defaults.

use serde::{Deserialize, Deserializer};

use crate::errors::{PanelError, Result};
use crate::types::TaskId;

/// `data.nodeType` value marking a control node.
pub const CONTROL_NODE_TYPE: &str = "control";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlowData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<FlowNode>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<FlowEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlowNode {
    pub id: String,
    /// Editor-level node type; not used by the engine.
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: NodeData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    /// `0` means "no task"; such nodes are not indexed.
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_id: TaskId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub node_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub control_type: String,
    /// Free-form node configuration, e.g. delay seconds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub config: String,
}

impl FlowNode {
    pub fn is_control(&self) -> bool {
        self.data.node_type.trim().eq_ignore_ascii_case(CONTROL_NODE_TYPE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source_handle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: EdgeData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EdgeData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a workflow's graph payload.
pub fn parse_flow(workflow_id: &str, payload: &str) -> Result<FlowData> {
    serde_json::from_str(payload).map_err(|source| PanelError::FlowParse {
        workflow: workflow_id.to_string(),
        source,
    })
}
