// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::config::{PanelFile, resolve_workflows};
use crate::errors::{PanelError, Result};
use crate::store::model::{CompletionRecord, NewRecord, TaskDef, TaskStats, Workflow};
use crate::store::{CompletionStore, TaskStore, WorkflowStore};
use crate::types::{ExecStatus, LogId, TaskId};

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RwLock<BTreeMap<TaskId, TaskDef>>,
    workflows: RwLock<BTreeMap<String, Workflow>>,
    records: RwLock<BTreeMap<LogId, CompletionRecord>>,
    stats: RwLock<HashMap<TaskId, TaskStats>>,
    next_log_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_log_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Seed a store from a validated panel file.
    pub fn from_panel(panel: &PanelFile, base_dir: &Path) -> Result<Self> {
        let store = Self::new();
        for task in panel.task_defs() {
            store.insert_task(task);
        }
        for wf in resolve_workflows(panel, base_dir)? {
            store.insert_workflow(wf);
        }
        Ok(store)
    }

    pub fn insert_task(&self, task: TaskDef) {
        self.tasks.write().insert(task.id, task);
    }

    pub fn insert_workflow(&self, workflow: Workflow) {
        self.workflows.write().insert(workflow.id.clone(), workflow);
    }

    /// Store a record as-is (e.g. to seed a completion event in tests).
    pub fn insert_record(&self, record: CompletionRecord) {
        self.records.write().insert(record.log_id, record);
    }

    /// All records, ordered by log ID.
    pub fn records(&self) -> Vec<CompletionRecord> {
        self.records.read().values().cloned().collect()
    }

    pub fn records_for_task(&self, task_id: TaskId) -> Vec<CompletionRecord> {
        self.records
            .read()
            .values()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn stats(&self, task_id: TaskId) -> TaskStats {
        self.stats.read().get(&task_id).copied().unwrap_or_default()
    }

    fn mint_log_id(&self) -> LogId {
        // `Default` starts the counter at 0; skip it so IDs are always > 0.
        let mut id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        if id == 0 {
            id = self.next_log_id.fetch_add(1, Ordering::SeqCst);
        }
        LogId(id)
    }
}

impl TaskStore for MemoryStore {
    fn get_task(&self, id: TaskId) -> Option<TaskDef> {
        self.tasks.read().get(&id).cloned()
    }
}

impl WorkflowStore for MemoryStore {
    fn get_workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.read().get(id).cloned()
    }

    fn list_enabled(&self) -> Result<Vec<Workflow>> {
        Ok(self
            .workflows
            .read()
            .values()
            .filter(|w| w.enabled)
            .cloned()
            .collect())
    }

    fn touch_last_run(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut workflows = self.workflows.write();
        let wf = workflows
            .get_mut(id)
            .ok_or_else(|| PanelError::WorkflowNotFound(id.to_string()))?;
        wf.last_run = Some(at);
        Ok(())
    }
}

impl CompletionStore for MemoryStore {
    fn create_running(&self, draft: NewRecord) -> Result<CompletionRecord> {
        let record = CompletionRecord {
            log_id: self.mint_log_id(),
            task_id: draft.task_id,
            command: draft.command,
            status: ExecStatus::Running,
            output: String::new(),
            exit_code: 0,
            error: None,
            duration_ms: 0,
            started_at: Utc::now(),
            finished_at: None,
            workflow_id: draft.workflow_id,
            workflow_run_id: draft.workflow_run_id,
        };
        self.records.write().insert(record.log_id, record.clone());
        Ok(record)
    }

    fn update_duration(&self, log_id: LogId, duration_ms: u64) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&log_id)
            .ok_or(PanelError::LogNotFound(log_id))?;
        record.duration_ms = duration_ms;
        Ok(())
    }

    fn complete(&self, record: &CompletionRecord) -> Result<()> {
        self.records.write().insert(record.log_id, record.clone());
        Ok(())
    }

    fn get_record(&self, log_id: LogId) -> Option<CompletionRecord> {
        self.records.read().get(&log_id).cloned()
    }

    fn increment_stats(&self, task_id: TaskId, status: ExecStatus) -> Result<()> {
        let mut stats = self.stats.write();
        let entry = stats.entry(task_id).or_default();
        match status {
            ExecStatus::Success => entry.success += 1,
            ExecStatus::Failed => entry.failed += 1,
            ExecStatus::Running => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_ids_are_unique_and_positive() {
        let store = MemoryStore::new();
        let a = store.create_running(NewRecord::default()).unwrap();
        let b = store.create_running(NewRecord::default()).unwrap();
        assert!(a.log_id.0 > 0);
        assert_ne!(a.log_id, b.log_id);
        assert_eq!(a.status, ExecStatus::Running);
    }

    #[test]
    fn default_store_also_skips_zero() {
        let store = MemoryStore::default();
        let a = store.create_running(NewRecord::default()).unwrap();
        assert!(a.log_id.0 > 0);
    }
}
