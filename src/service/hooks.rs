// src/service/hooks.rs

//! Persistence-backed [`Hooks`]: one completion record per execution.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{PanelError, Result};
use crate::exec::{ExecutionRequest, ExecutionResult, HookFuture, Hooks};
use crate::livelog::{LogRegistry, compress_text};
use crate::store::{NewRecord, SharedStore};
use crate::types::{LogId, TaskId};
use crate::workflow::{CompletionPublisher, WorkflowContext};

pub struct PersistingHooks {
    store: SharedStore,
    registry: Arc<LogRegistry>,
    task_id: TaskId,
    context: Option<WorkflowContext>,
    publisher: Option<CompletionPublisher>,
}

impl fmt::Debug for PersistingHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistingHooks")
            .field("task_id", &self.task_id)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl PersistingHooks {
    pub fn new(
        store: SharedStore,
        registry: Arc<LogRegistry>,
        task_id: TaskId,
        context: Option<WorkflowContext>,
        publisher: Option<CompletionPublisher>,
    ) -> Self {
        Self {
            store,
            registry,
            task_id,
            context,
            publisher,
        }
    }

    /// Final output text: captured process output followed by executor
    /// notes and the error under `[ERROR]`, compressed.
    fn collect_output(&self, log_id: LogId, result: &ExecutionResult) -> Result<String> {
        let mut notes = String::new();
        if !result.output.is_empty() {
            notes.push('\n');
            notes.push_str(&result.output);
        }
        if let Some(err) = &result.error {
            notes.push_str("\n[ERROR]\n");
            notes.push_str(err);
        }

        match self.registry.get(log_id) {
            Some(log) => {
                if !notes.is_empty() {
                    log.write(notes.as_bytes())?;
                }
                log.compress_and_cleanup()
            }
            None => Ok(compress_text(notes.trim_start_matches('\n'))?),
        }
    }
}

impl Hooks for PersistingHooks {
    fn pre_execute<'a>(&'a self, request: &'a ExecutionRequest) -> HookFuture<'a, LogId> {
        Box::pin(async move {
            let record = self.store.create_running(NewRecord {
                task_id: self.task_id,
                command: request.command.clone(),
                workflow_id: self.context.as_ref().map(|c| c.workflow_id.clone()),
                workflow_run_id: self.context.as_ref().map(|c| c.run_id.clone()),
            })?;
            debug!(task_id = self.task_id, log_id = %record.log_id, "completion record created");
            Ok(record.log_id)
        })
    }

    fn on_heartbeat(&self, log_id: LogId, elapsed_ms: u64) -> HookFuture<'_, ()> {
        Box::pin(async move { self.store.update_duration(log_id, elapsed_ms) })
    }

    fn post_execute<'a>(
        &'a self,
        log_id: LogId,
        result: &'a ExecutionResult,
    ) -> HookFuture<'a, ()> {
        Box::pin(async move {
            let mut record = self
                .store
                .get_record(log_id)
                .ok_or(PanelError::LogNotFound(log_id))?;

            // A failed compression still finalizes the record.
            let (output, output_err) = match self.collect_output(log_id, result) {
                Ok(o) => (o, None),
                Err(e) => {
                    warn!(log_id = %log_id, error = %e, "could not collect execution output");
                    (String::new(), Some(e))
                }
            };

            record.status = result.status;
            record.exit_code = result.exit_code;
            record.duration_ms = result.duration_ms;
            record.finished_at = Some(result.finished_at);
            record.error = result.error.clone();
            record.output = output;
            self.store.complete(&record)?;

            if let Err(e) = self.store.increment_stats(self.task_id, record.status) {
                warn!(task_id = self.task_id, error = %e, "could not update task stats");
            }

            if let Some(publisher) = &self.publisher {
                publisher.publish(record).await?;
            }

            match output_err {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}
