// src/store/mod.rs

//! Persistence collaborators.
//!
//! The engine never talks to a database directly; it goes through these
//! traits. [`memory::MemoryStore`] implements all of them in memory and is
//! what the CLI and the tests use.

pub mod memory;
pub mod model;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::types::{ExecStatus, LogId, TaskId};

pub use memory::MemoryStore;
pub use model::{CompletionRecord, NewRecord, TaskDef, TaskStats, Workflow};

/// Read access to registered tasks.
pub trait TaskStore: Send + Sync {
    fn get_task(&self, id: TaskId) -> Option<TaskDef>;
}

/// Workflow definitions.
pub trait WorkflowStore: Send + Sync {
    fn get_workflow(&self, id: &str) -> Option<Workflow>;

    /// Every workflow with `enabled = true`.
    fn list_enabled(&self) -> Result<Vec<Workflow>>;

    fn touch_last_run(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// Completion records (the "task log" table) and stats.
pub trait CompletionStore: Send + Sync {
    /// Create a `Running` record, minting its log ID.
    fn create_running(&self, draft: NewRecord) -> Result<CompletionRecord>;

    /// Refresh the live duration of a running record.
    fn update_duration(&self, log_id: LogId, duration_ms: u64) -> Result<()>;

    /// Persist the final state of a record.
    fn complete(&self, record: &CompletionRecord) -> Result<()>;

    fn get_record(&self, log_id: LogId) -> Option<CompletionRecord>;

    fn increment_stats(&self, task_id: TaskId, status: ExecStatus) -> Result<()>;
}

/// Everything the engine and the task service need from persistence.
pub trait PanelStore: TaskStore + WorkflowStore + CompletionStore {}

impl<T: TaskStore + WorkflowStore + CompletionStore> PanelStore for T {}

pub type SharedStore = Arc<dyn PanelStore>;
