#![allow(dead_code)]

use chrono::Utc;
use serde_json::{Value, json};
use taskdeck::exec::LanguageSpec;
use taskdeck::livelog::compress_text;
use taskdeck::store::{CompletionRecord, TaskDef, Workflow};
use taskdeck::types::{ExecStatus, LogId, TaskId};

/// Builder for `TaskDef`.
pub struct TaskDefBuilder {
    task: TaskDef,
}

impl TaskDefBuilder {
    pub fn new(id: TaskId, cmd: &str) -> Self {
        Self {
            task: TaskDef::new(id, format!("task-{id}"), cmd),
        }
    }

    /// A control task (empty command, `tags` set to the sub-type).
    pub fn control(id: TaskId, sub_type: &str) -> Self {
        Self::new(id, "").tags(sub_type)
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.task.envs.push((key.to_string(), value.to_string()));
        self
    }

    pub fn tags(mut self, tags: &str) -> Self {
        self.task.tags = Some(tags.to_string());
        self
    }

    pub fn timeout_minutes(mut self, minutes: i64) -> Self {
        self.task.timeout_minutes = minutes;
        self
    }

    pub fn language(mut self, name: &str, version: Option<&str>) -> Self {
        self.task.languages.push(LanguageSpec::new(name, version));
        self.task.use_version_manager = true;
        self
    }

    pub fn build(self) -> TaskDef {
        self.task
    }
}

/// Builder for workflow graph payloads (the JSON the editor stores).
#[derive(Default)]
pub struct FlowBuilder {
    nodes: Vec<Value>,
    edges: Vec<Value>,
}

impl FlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A normal task node.
    pub fn node(mut self, id: &str, task_id: TaskId) -> Self {
        self.nodes.push(json!({
            "id": id,
            "type": "custom",
            "data": { "taskId": task_id, "nodeType": "task" }
        }));
        self
    }

    /// A control node; the sub-type comes from the task's tags.
    pub fn control(mut self, id: &str, task_id: TaskId, config: &str) -> Self {
        self.nodes.push(json!({
            "id": id,
            "type": "custom",
            "data": { "taskId": task_id, "nodeType": "control", "config": config }
        }));
        self
    }

    /// Edge with the condition carried in `sourceHandle`.
    pub fn edge(mut self, source: &str, target: &str, condition: &str) -> Self {
        let id = format!("e-{source}-{target}-{}", self.edges.len());
        self.edges.push(json!({
            "id": id,
            "source": source,
            "target": target,
            "sourceHandle": condition,
            "label": null,
            "data": null
        }));
        self
    }

    /// Edge with the condition carried in `label`.
    pub fn labelled_edge(mut self, source: &str, target: &str, label: &str) -> Self {
        let id = format!("e-{source}-{target}-{}", self.edges.len());
        self.edges.push(json!({
            "id": id,
            "source": source,
            "target": target,
            "label": label
        }));
        self
    }

    /// Edge with the condition carried in `data.condition`.
    pub fn data_edge(mut self, source: &str, target: &str, condition: &str) -> Self {
        let id = format!("e-{source}-{target}-{}", self.edges.len());
        self.edges.push(json!({
            "id": id,
            "source": source,
            "target": target,
            "data": { "condition": condition }
        }));
        self
    }

    pub fn build(self) -> String {
        json!({ "nodes": self.nodes, "edges": self.edges }).to_string()
    }
}

/// An enabled workflow with the given graph payload.
pub fn workflow(id: &str, flow_data: &str) -> Workflow {
    Workflow {
        id: id.to_string(),
        name: id.to_string(),
        enabled: true,
        flow_data: flow_data.to_string(),
        last_run: None,
        next_run: None,
    }
}

/// A finished completion record for `task_id`.
pub fn completion(log_id: u64, task_id: TaskId, status: ExecStatus) -> CompletionRecord {
    let now = Utc::now();
    CompletionRecord {
        log_id: LogId(log_id),
        task_id,
        command: format!("task-{task_id}"),
        status,
        output: String::new(),
        exit_code: if status == ExecStatus::Failed { 1 } else { 0 },
        error: None,
        duration_ms: 0,
        started_at: now,
        finished_at: Some(now),
        workflow_id: None,
        workflow_run_id: None,
    }
}

/// Same as [`completion`], with `output` stored compressed.
pub fn completion_with_output(
    log_id: u64,
    task_id: TaskId,
    status: ExecStatus,
    output: &str,
) -> CompletionRecord {
    let mut record = completion(log_id, task_id, status);
    record.output = compress_text(output).expect("compress output");
    record
}
