// src/workflow/graph.rs

//! Lookup structures over a parsed [`FlowData`].

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;

use crate::types::TaskId;
use crate::workflow::flow::{FlowData, FlowEdge, FlowNode};

/// A node that references a task, as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTarget {
    pub node_id: String,
    pub task_id: TaskId,
    /// `Some` for control nodes.
    pub control: Option<ControlSpec>,
}

/// Raw control node settings; resolved into a
/// [`NodeKind`](crate::workflow::control::NodeKind) at dispatch time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlSpec {
    /// `data.controlType`; empty means "use the task's tags".
    pub control_type: String,
    pub config: String,
}

impl NodeTarget {
    fn from_node(node: &FlowNode) -> Self {
        let control = node.is_control().then(|| ControlSpec {
            control_type: node.data.control_type.trim().to_string(),
            config: node.data.config.clone(),
        });
        Self {
            node_id: node.id.clone(),
            task_id: node.data.task_id,
            control,
        }
    }
}

/// Node index plus edge topology for one workflow graph.
#[derive(Debug)]
pub struct FlowIndex<'a> {
    flow: &'a FlowData,
    nodes: HashMap<&'a str, NodeTarget>,
    topology: DiGraphMap<&'a str, ()>,
}

impl<'a> FlowIndex<'a> {
    pub fn new(flow: &'a FlowData) -> Self {
        let nodes = flow
            .nodes
            .iter()
            .filter(|n| n.data.task_id != 0)
            .map(|n| (n.id.as_str(), NodeTarget::from_node(n)))
            .collect();

        let mut topology = DiGraphMap::new();
        for n in &flow.nodes {
            topology.add_node(n.id.as_str());
        }
        for e in &flow.edges {
            topology.add_edge(e.source.as_str(), e.target.as_str(), ());
        }

        Self {
            flow,
            nodes,
            topology,
        }
    }

    /// Indexed node by ID (nodes with `taskId == 0` are not indexed).
    pub fn node(&self, id: &str) -> Option<&NodeTarget> {
        self.nodes.get(id)
    }

    /// Edges whose source node references `task_id`.
    pub fn edges_from_task(&self, task_id: TaskId) -> impl Iterator<Item = &'a FlowEdge> + '_ {
        self.flow.edges.iter().filter(move |e| {
            self.nodes
                .get(e.source.as_str())
                .is_some_and(|n| n.task_id == task_id)
        })
    }

    /// Nodes with no incoming edge that reference a task, in payload order.
    pub fn roots(&self) -> Vec<&NodeTarget> {
        self.flow
            .nodes
            .iter()
            .filter(|n| n.data.task_id > 0)
            .filter(|n| {
                self.topology
                    .neighbors_directed(n.id.as_str(), Direction::Incoming)
                    .next()
                    .is_none()
            })
            .filter_map(|n| self.nodes.get(n.id.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::flow::parse_flow;

    const CHAIN: &str = r#"{
        "nodes": [
            {"id": "a", "data": {"taskId": 1}},
            {"id": "b", "data": {"taskId": 2}},
            {"id": "note", "data": {"taskId": 0}}
        ],
        "edges": [{"id": "e", "source": "a", "target": "b"}]
    }"#;

    #[test]
    fn roots_are_nodes_without_incoming_edges() {
        let flow = parse_flow("wf", CHAIN).unwrap();
        let index = FlowIndex::new(&flow);
        let roots: Vec<_> = index.roots().into_iter().map(|n| n.task_id).collect();
        assert_eq!(roots, vec![1]);
        assert!(index.node("note").is_none());
    }

    #[test]
    fn cycle_has_no_roots() {
        let flow = parse_flow(
            "wf",
            r#"{
                "nodes": [{"id": "a", "data": {"taskId": 1}}, {"id": "b", "data": {"taskId": 2}}],
                "edges": [
                    {"id": "ab", "source": "a", "target": "b"},
                    {"id": "ba", "source": "b", "target": "a"}
                ]
            }"#,
        )
        .unwrap();
        assert!(FlowIndex::new(&flow).roots().is_empty());
    }

    #[test]
    fn edges_from_task_matches_by_task_id() {
        let flow = parse_flow("wf", CHAIN).unwrap();
        let index = FlowIndex::new(&flow);
        assert_eq!(index.edges_from_task(1).count(), 1);
        assert_eq!(index.edges_from_task(2).count(), 0);
    }
}
