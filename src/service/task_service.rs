// src/service/task_service.rs

//! `ExecuteTask`: the task-level entry point shared by callers and the
//! workflow engine.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::errors::{PanelError, Result};
use crate::exec::{ExecutionReport, ExecutionRequest, ExecutionResult, Executor, Hooks, Streams};
use crate::service::hooks::PersistingHooks;
use crate::store::SharedStore;
use crate::types::{EnvVar, TaskId};
use crate::workflow::{CompletionPublisher, EnvNames, InvokeFuture, TaskInvoker};

/// Results kept in the in-memory history.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// One finished task execution in the history.
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub task_id: TaskId,
    pub result: ExecutionResult,
}

pub struct TaskService {
    executor: Executor,
    store: SharedStore,
    names: EnvNames,
    publisher: Option<CompletionPublisher>,
    streams: Streams,
    running: Mutex<HashMap<TaskId, usize>>,
    history: Mutex<VecDeque<TaskRun>>,
    history_limit: usize,
}

impl fmt::Debug for TaskService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskService")
            .field("executor", &self.executor)
            .field("running", &self.running_count())
            .finish_non_exhaustive()
    }
}

/// Counts a task as running until dropped.
struct RunningGuard<'a> {
    running: &'a Mutex<HashMap<TaskId, usize>>,
    task_id: TaskId,
}

impl<'a> RunningGuard<'a> {
    fn enter(running: &'a Mutex<HashMap<TaskId, usize>>, task_id: TaskId) -> Self {
        *running.lock().entry(task_id).or_default() += 1;
        Self { running, task_id }
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut running = self.running.lock();
        if let Some(n) = running.get_mut(&self.task_id) {
            *n -= 1;
            if *n == 0 {
                running.remove(&self.task_id);
            }
        }
    }
}

impl TaskService {
    pub fn new(executor: Executor, store: SharedStore, names: EnvNames) -> Self {
        Self {
            executor,
            store,
            names,
            publisher: None,
            streams: Streams::discard(),
            running: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Publish completions to a workflow engine.
    pub fn with_publisher(mut self, publisher: CompletionPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Where process output goes besides the live log.
    pub fn with_streams(mut self, streams: Streams) -> Self {
        self.streams = streams;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Run one registered task with `extra_envs` layered over its own envs.
    pub async fn run_task(&self, task_id: TaskId, extra_envs: Vec<EnvVar>) -> Result<ExecutionReport> {
        let task = self
            .store
            .get_task(task_id)
            .ok_or(PanelError::TaskNotFound(task_id))?;

        let context = self.names.context_from(&extra_envs);

        let mut request = ExecutionRequest::new(task.command.clone());
        request.work_dir = task.work_dir.clone();
        request.envs = task.envs.iter().cloned().chain(extra_envs).collect();
        request.timeout_minutes = task.timeout_minutes;
        request.languages = task.languages.clone();
        request.use_version_manager = task.use_version_manager;

        let hooks: Arc<dyn Hooks> = Arc::new(PersistingHooks::new(
            Arc::clone(&self.store),
            Arc::clone(self.executor.registry()),
            task_id,
            context,
            self.publisher.clone(),
        ));

        info!(task_id, name = %task.name, "executing task");
        let report = {
            let _running = RunningGuard::enter(&self.running, task_id);
            self.executor
                .execute(request, self.streams.clone(), Some(hooks))
                .await
        };

        if let Some(err) = &report.error {
            warn!(task_id, error = %err, "task execution failed");
        }

        self.record_history(task_id, &report.result);
        Ok(report)
    }

    /// Number of distinct tasks currently running.
    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    /// Up to `count` most recent results, newest first.
    pub fn last_results(&self, count: usize) -> Vec<TaskRun> {
        self.history.lock().iter().rev().take(count).cloned().collect()
    }

    fn record_history(&self, task_id: TaskId, result: &ExecutionResult) {
        let mut history = self.history.lock();
        history.push_back(TaskRun {
            task_id,
            result: result.clone(),
        });
        while history.len() > self.history_limit {
            history.pop_front();
        }
    }
}

impl TaskInvoker for TaskService {
    fn execute_task(&self, task_id: TaskId, extra_envs: Vec<EnvVar>) -> InvokeFuture<'_> {
        Box::pin(self.run_task(task_id, extra_envs))
    }
}
