// src/workflow/engine.rs

//! Async shell around [`plan`](crate::workflow::plan): loads workflows,
//! dispatches the planned hops and handles control nodes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::{PanelError, Result};
use crate::livelog::compress_text;
use crate::store::{CompletionRecord, NewRecord, SharedStore};
use crate::types::{EnvVar, ExecStatus};
use crate::workflow::control::{NodeKind, delay_duration, delay_output};
use crate::workflow::dispatch::{CompletionEvent, Dispatcher};
use crate::workflow::env::{EnvNames, RunId};
use crate::workflow::invoker::TaskInvoker;
use crate::workflow::plan::{Dispatch, plan_completion, plan_roots};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Pause before a normal downstream task starts, so the upstream
    /// completion is persisted first.
    pub settle_delay: Duration,
    pub env_prefix: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            env_prefix: crate::workflow::env::DEFAULT_ENV_PREFIX.to_string(),
        }
    }
}

/// Chains task completions into downstream executions.
pub struct WorkflowEngine {
    store: SharedStore,
    invoker: Arc<dyn TaskInvoker>,
    dispatcher: Dispatcher,
    names: EnvNames,
    settle_delay: Duration,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("dispatcher", &self.dispatcher)
            .field("prefix", &self.names.prefix())
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(
        store: SharedStore,
        invoker: Arc<dyn TaskInvoker>,
        dispatcher: Dispatcher,
        options: EngineOptions,
    ) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            store,
            invoker,
            dispatcher,
            names: EnvNames::new(&options.env_prefix)?,
            settle_delay: options.settle_delay,
        }))
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn env_names(&self) -> &EnvNames {
        &self.names
    }

    /// Evaluate every enabled workflow against one completion and dispatch
    /// the matching hops. Never blocks on the hops themselves.
    pub fn on_completion(self: &Arc<Self>, record: &CompletionRecord) {
        if !record.status.is_terminal() {
            debug!(task_id = record.task_id, status = %record.status, "ignoring non-terminal completion");
            return;
        }

        let workflows = match self.store.list_enabled() {
            Ok(w) => w,
            Err(e) => {
                error!(error = %e, "could not load enabled workflows");
                return;
            }
        };

        let plan = plan_completion(record, &workflows, &self.names);

        for (workflow, err) in plan.skipped {
            warn!(workflow = %workflow, error = %err, "skipping workflow with unreadable graph");
        }

        for hop in plan.dispatches {
            info!(
                task_id = record.task_id,
                status = %record.status,
                workflow = %hop.workflow_id,
                run_id = %hop.run_id,
                target = hop.target.task_id,
                "edge fired"
            );
            self.submit(hop);
        }
    }

    /// Start every root node of `workflow_id` in a fresh run.
    pub fn trigger_workflow(
        self: &Arc<Self>,
        workflow_id: &str,
        extra_envs: Vec<EnvVar>,
    ) -> Result<RunId> {
        let workflow = self
            .store
            .get_workflow(workflow_id)
            .ok_or_else(|| PanelError::WorkflowNotFound(workflow_id.to_string()))?;

        let (run_id, roots) = plan_roots(&workflow, &self.names, &extra_envs)?;

        self.store.touch_last_run(&workflow.id, Utc::now())?;

        info!(workflow = %workflow.id, run_id = %run_id, roots = roots.len(), "workflow triggered");
        for hop in roots {
            self.submit(hop);
        }
        Ok(run_id)
    }

    /// Consume completions published by the persistence hooks until every
    /// publisher is gone.
    pub async fn run_completions(self: Arc<Self>, mut rx: mpsc::Receiver<CompletionEvent>) {
        debug!("workflow engine listening for completions");
        while let Some(event) = rx.recv().await {
            self.on_completion(&event.record);
        }
        debug!("completion channel closed");
    }

    /// Wait until no hop is running or queued.
    pub async fn wait_idle(&self) {
        self.dispatcher.wait_idle().await;
    }

    fn submit(self: &Arc<Self>, hop: Dispatch) {
        let engine = Arc::clone(self);
        self.dispatcher.spawn(async move { engine.run_hop(hop).await });
    }

    async fn run_hop(self: Arc<Self>, hop: Dispatch) {
        let task = self.store.get_task(hop.target.task_id);
        let kind = NodeKind::resolve(&hop.target, task.as_ref());

        if kind.is_control() && task.is_none() {
            error!(task_id = hop.target.task_id, workflow = %hop.workflow_id, "control node task not found");
            return;
        }

        match kind {
            NodeKind::Task => {
                if hop.settle {
                    tokio::time::sleep(self.settle_delay).await;
                }
                let task_id = hop.target.task_id;
                match self.invoker.execute_task(task_id, hop.envs).await {
                    Ok(report) => {
                        debug!(task_id, status = %report.result.status, "downstream task finished");
                    }
                    Err(e) => {
                        warn!(task_id, workflow = %hop.workflow_id, error = %e, "downstream task could not run");
                    }
                }
            }
            NodeKind::Delay { seconds } => {
                info!(task_id = hop.target.task_id, run_id = %hop.run_id, seconds, "delay node waiting");
                let record = self.open_control_record(&hop, task.as_ref());
                tokio::time::sleep(delay_duration(seconds)).await;
                self.complete_control(record, &delay_output(seconds));
            }
            NodeKind::UnknownControl(sub_type) => {
                warn!(task_id = hop.target.task_id, sub_type = %sub_type, "unknown control node; completing immediately");
                let record = self.open_control_record(&hop, task.as_ref());
                self.complete_control(record, "");
            }
        }
    }

    fn open_control_record(
        &self,
        hop: &Dispatch,
        task: Option<&crate::store::TaskDef>,
    ) -> Option<CompletionRecord> {
        let name = task.map(|t| t.name.as_str()).unwrap_or_default();
        let draft = NewRecord {
            task_id: hop.target.task_id,
            command: format!("Workflow Control: {name}"),
            workflow_id: Some(hop.workflow_id.clone()),
            workflow_run_id: Some(hop.run_id.to_string()),
        };
        match self.store.create_running(draft) {
            Ok(r) => Some(r),
            Err(e) => {
                error!(task_id = hop.target.task_id, error = %e, "could not create control record");
                None
            }
        }
    }

    /// Mark a control record successful, persist it and propagate from it.
    fn complete_control(self: &Arc<Self>, record: Option<CompletionRecord>, output: &str) {
        let Some(mut record) = record else {
            return;
        };

        let finished_at = Utc::now();
        record.status = ExecStatus::Success;
        record.exit_code = 0;
        record.finished_at = Some(finished_at);
        record.duration_ms = (finished_at - record.started_at)
            .num_milliseconds()
            .max(0) as u64;
        record.output = match compress_text(output) {
            Ok(s) => s,
            Err(e) => {
                warn!(log_id = %record.log_id, error = %e, "could not compress control output");
                String::new()
            }
        };

        if let Err(e) = self.store.complete(&record) {
            error!(log_id = %record.log_id, error = %e, "could not persist control record");
        }
        if let Err(e) = self.store.increment_stats(record.task_id, record.status) {
            warn!(task_id = record.task_id, error = %e, "could not update stats");
        }

        self.on_completion(&record);
    }
}
