// src/workflow/plan.rs

//! Pure planning: which hops does a completion (or a manual trigger) cause?
//!
//! Nothing here touches a store or spawns anything; the engine feeds the
//! inputs in and dispatches whatever comes back.

use tracing::warn;

use crate::errors::{PanelError, Result};
use crate::livelog::decompress_text;
use crate::store::{CompletionRecord, Workflow};
use crate::types::{EnvVar, WorkflowId};
use crate::workflow::condition::EdgeCondition;
use crate::workflow::env::{EnvNames, RunId};
use crate::workflow::flow::parse_flow;
use crate::workflow::graph::{FlowIndex, NodeTarget};

/// One downstream hop to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub target: NodeTarget,
    /// Identity variables first, then captured or caller-supplied ones.
    pub envs: Vec<EnvVar>,
    /// Wait for the settle delay before starting (normal task hops only).
    pub settle: bool,
}

#[derive(Debug, Default)]
pub struct CompletionPlan {
    pub dispatches: Vec<Dispatch>,
    /// Workflows whose graph could not be parsed; the rest are unaffected.
    pub skipped: Vec<(WorkflowId, PanelError)>,
}

/// Evaluate every workflow against one completion.
pub fn plan_completion(
    record: &CompletionRecord,
    workflows: &[Workflow],
    names: &EnvNames,
) -> CompletionPlan {
    let mut plan = CompletionPlan::default();
    if !record.status.is_terminal() {
        return plan;
    }

    let captured = captured_envs(record, names);

    for wf in workflows {
        if wf.flow_data.trim().is_empty() {
            continue;
        }
        let flow = match parse_flow(&wf.id, &wf.flow_data) {
            Ok(f) => f,
            Err(e) => {
                plan.skipped.push((wf.id.clone(), e));
                continue;
            }
        };
        let index = FlowIndex::new(&flow);

        // One run ID per workflow per completion: continued if the upstream
        // record belongs to a run, else minted on first use.
        let mut run_id: Option<RunId> = None;

        for edge in index.edges_from_task(record.task_id) {
            if !EdgeCondition::of_edge(edge).fires(record.status) {
                continue;
            }
            let Some(target) = index.node(&edge.target).filter(|n| n.task_id > 0) else {
                continue;
            };

            let run_id = run_id
                .get_or_insert_with(|| match record.workflow_run_id.as_deref() {
                    Some(r) if !r.is_empty() => RunId::from(r.to_string()),
                    _ => RunId::mint(),
                })
                .clone();

            let mut envs = names.identity(&wf.id, &run_id);
            envs.extend(captured.iter().cloned());

            plan.dispatches.push(Dispatch {
                workflow_id: wf.id.clone(),
                run_id,
                settle: target.control.is_none(),
                target: target.clone(),
                envs,
            });
        }
    }

    plan
}

/// Root hops for a manual trigger of `workflow`.
pub fn plan_roots(
    workflow: &Workflow,
    names: &EnvNames,
    extra_envs: &[EnvVar],
) -> Result<(RunId, Vec<Dispatch>)> {
    if !workflow.enabled || workflow.flow_data.trim().is_empty() {
        return Err(PanelError::WorkflowUnavailable(workflow.id.clone()));
    }

    let flow = parse_flow(&workflow.id, &workflow.flow_data)?;
    let index = FlowIndex::new(&flow);
    let roots = index.roots();
    if roots.is_empty() {
        return Err(PanelError::NoRootNode(workflow.id.clone()));
    }

    let run_id = RunId::mint();
    let mut envs = names.identity(&workflow.id, &run_id);
    envs.push((names.wf_trigger(), "manual".to_string()));
    envs.extend(extra_envs.iter().cloned());

    let dispatches = roots
        .into_iter()
        .map(|target| Dispatch {
            workflow_id: workflow.id.clone(),
            run_id: run_id.clone(),
            target: target.clone(),
            envs: envs.clone(),
            settle: false,
        })
        .collect();

    Ok((run_id, dispatches))
}

fn captured_envs(record: &CompletionRecord, names: &EnvNames) -> Vec<EnvVar> {
    if record.output.is_empty() {
        return Vec::new();
    }
    match decompress_text(&record.output) {
        Ok(text) => names.capture_outputs(&text),
        Err(e) => {
            warn!(log_id = %record.log_id, error = %e, "could not decompress upstream output; no variables captured");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::livelog::compress_text;
    use crate::types::{ExecStatus, LogId};
    use chrono::Utc;

    fn names() -> EnvNames {
        EnvNames::new("PANEL").unwrap()
    }

    fn workflow(id: &str, flow: &str) -> Workflow {
        Workflow {
            id: id.into(),
            name: id.into(),
            enabled: true,
            flow_data: flow.into(),
            last_run: None,
            next_run: None,
        }
    }

    fn record(task_id: i64, status: ExecStatus) -> CompletionRecord {
        CompletionRecord {
            log_id: LogId(7),
            task_id,
            command: "true".into(),
            status,
            output: String::new(),
            exit_code: 0,
            error: None,
            duration_ms: 0,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
            workflow_id: None,
            workflow_run_id: None,
        }
    }

    const A_TO_B: &str = r#"{
        "nodes": [{"id": "a", "data": {"taskId": 1}}, {"id": "b", "data": {"taskId": 2}}],
        "edges": [{"id": "e", "source": "a", "target": "b", "sourceHandle": "success"}]
    }"#;

    #[test]
    fn running_records_plan_nothing() {
        let plan = plan_completion(
            &record(1, ExecStatus::Running),
            &[workflow("wf", A_TO_B)],
            &names(),
        );
        assert!(plan.dispatches.is_empty());
    }

    #[test]
    fn upstream_run_id_is_continued_and_outputs_captured() {
        let mut rec = record(1, ExecStatus::Success);
        rec.workflow_run_id = Some("WF-RUN-42".into());
        rec.output = compress_text("PANEL_OUT_TOKEN=abc\n").unwrap();

        let plan = plan_completion(&rec, &[workflow("wf", A_TO_B)], &names());
        assert_eq!(plan.dispatches.len(), 1);
        let d = &plan.dispatches[0];
        assert_eq!(d.run_id.as_str(), "WF-RUN-42");
        assert_eq!(d.target.task_id, 2);
        assert!(d.settle);
        assert!(d.envs.contains(&("PANEL_WF_ID".into(), "wf".into())));
        assert!(d.envs.contains(&("PANEL_TOKEN".into(), "abc".into())));
    }

    #[test]
    fn bad_graph_is_skipped_without_hiding_others() {
        let plan = plan_completion(
            &record(1, ExecStatus::Success),
            &[workflow("bad", "{oops"), workflow("good", A_TO_B)],
            &names(),
        );
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].0, "bad");
        assert_eq!(plan.dispatches.len(), 1);
        assert_eq!(plan.dispatches[0].workflow_id, "good");
    }

    #[test]
    fn roots_get_trigger_marker_and_extra_envs() {
        let (run_id, dispatches) = plan_roots(
            &workflow("wf", A_TO_B),
            &names(),
            &[("EXTRA".into(), "1".into())],
        )
        .unwrap();
        assert_eq!(dispatches.len(), 1);
        let d = &dispatches[0];
        assert_eq!(d.run_id, run_id);
        assert!(!d.settle);
        assert!(d.envs.contains(&("PANEL_WF_TRIGGER".into(), "manual".into())));
        assert_eq!(d.envs.last(), Some(&("EXTRA".into(), "1".into())));
    }

    #[test]
    fn disabled_or_empty_workflows_are_unavailable() {
        let mut wf = workflow("wf", A_TO_B);
        wf.enabled = false;
        assert!(matches!(
            plan_roots(&wf, &names(), &[]),
            Err(PanelError::WorkflowUnavailable(_))
        ));
        assert!(matches!(
            plan_roots(&workflow("empty", ""), &names(), &[]),
            Err(PanelError::WorkflowUnavailable(_))
        ));
    }
}
