// src/store/model.rs

//! Records exchanged with the persistence collaborators.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::exec::LanguageSpec;
use crate::types::{EnvVar, ExecStatus, LogId, TaskId, WorkflowId};

/// A registered task as the executor needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
    pub id: TaskId,
    pub name: String,
    pub command: String,
    pub work_dir: Option<PathBuf>,
    pub envs: Vec<EnvVar>,
    /// Minutes; `<= 0` means the executor default.
    pub timeout_minutes: i64,
    pub languages: Vec<LanguageSpec>,
    pub use_version_manager: bool,
    /// Control sub-type for tasks referenced by control nodes (e.g. `delay`).
    pub tags: Option<String>,
}

impl TaskDef {
    pub fn new(id: TaskId, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            command: command.into(),
            work_dir: None,
            envs: Vec::new(),
            timeout_minutes: 0,
            languages: Vec::new(),
            use_version_manager: false,
            tags: None,
        }
    }
}

/// A workflow definition. `flow_data` is the raw JSON graph payload and is
/// only parsed when the engine evaluates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub enabled: bool,
    pub flow_data: String,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
}

/// What a new completion record starts with.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub task_id: TaskId,
    pub command: String,
    pub workflow_id: Option<WorkflowId>,
    pub workflow_run_id: Option<String>,
}

/// Persisted record of one execution, real or synthetic.
///
/// The workflow engine consumes these as completion events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub log_id: LogId,
    pub task_id: TaskId,
    pub command: String,
    pub status: ExecStatus,
    /// base64(zlib(output)).
    pub output: String,
    pub exit_code: i32,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub workflow_id: Option<WorkflowId>,
    pub workflow_run_id: Option<String>,
}

/// Per-task success/failure counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub success: u64,
    pub failed: u64,
}
