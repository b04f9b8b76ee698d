// src/workflow/condition.rs

//! Edge conditions.
//!
//! The editor stores the condition of an edge in one of three places; the
//! first non-empty one wins, in this order: `sourceHandle`, `data.condition`,
//! `label`.

use crate::types::ExecStatus;
use crate::workflow::flow::FlowEdge;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeCondition {
    /// `success` / `on_success`
    OnSuccess,
    /// `error` / `failed` / `on_error`
    OnError,
    /// empty or `always`
    Always,
    /// Anything else. Never fires.
    Unknown(String),
}

impl EdgeCondition {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "success" | "on_success" => EdgeCondition::OnSuccess,
            "error" | "failed" | "on_error" => EdgeCondition::OnError,
            "" | "always" => EdgeCondition::Always,
            _ => EdgeCondition::Unknown(raw.trim().to_string()),
        }
    }

    /// Normalize an edge's condition from whichever field carries it.
    pub fn of_edge(edge: &FlowEdge) -> Self {
        let raw = [
            edge.source_handle.as_str(),
            edge.data.condition.as_str(),
            edge.label.as_str(),
        ]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .unwrap_or("");

        Self::parse(raw)
    }

    /// Does this edge fire for an upstream completion with `status`?
    pub fn fires(&self, status: ExecStatus) -> bool {
        match self {
            EdgeCondition::OnSuccess => status == ExecStatus::Success,
            EdgeCondition::OnError => status == ExecStatus::Failed,
            EdgeCondition::Always => status.is_terminal(),
            EdgeCondition::Unknown(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::flow::EdgeData;

    fn edge(handle: &str, condition: &str, label: &str) -> FlowEdge {
        FlowEdge {
            source: "a".into(),
            target: "b".into(),
            source_handle: handle.into(),
            label: label.into(),
            data: EdgeData {
                condition: condition.into(),
            },
            ..FlowEdge::default()
        }
    }

    #[test]
    fn handle_wins_over_data_and_label() {
        let e = edge("failed", "success", "success");
        assert_eq!(EdgeCondition::of_edge(&e), EdgeCondition::OnError);
    }

    #[test]
    fn data_condition_wins_over_label() {
        let e = edge("", "on_success", "error");
        assert_eq!(EdgeCondition::of_edge(&e), EdgeCondition::OnSuccess);
    }

    #[test]
    fn label_is_the_last_fallback() {
        let e = edge("", "", "on_error");
        assert_eq!(EdgeCondition::of_edge(&e), EdgeCondition::OnError);
        assert_eq!(EdgeCondition::of_edge(&edge("", "", "")), EdgeCondition::Always);
    }

    #[test]
    fn running_status_never_fires() {
        for c in [
            EdgeCondition::OnSuccess,
            EdgeCondition::OnError,
            EdgeCondition::Always,
        ] {
            assert!(!c.fires(ExecStatus::Running));
        }
    }

    #[test]
    fn unknown_condition_never_fires() {
        let c = EdgeCondition::parse("maybe");
        assert_eq!(c, EdgeCondition::Unknown("maybe".into()));
        assert!(!c.fires(ExecStatus::Success));
        assert!(!c.fires(ExecStatus::Failed));
    }
}
