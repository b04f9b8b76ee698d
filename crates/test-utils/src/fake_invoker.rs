use std::sync::{Arc, Mutex};

use chrono::Utc;
use taskdeck::exec::{ExecutionReport, ExecutionResult};
use taskdeck::types::{EnvVar, ExecStatus, TaskId};
use taskdeck::workflow::{InvokeFuture, TaskInvoker};

/// One recorded `execute_task` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub task_id: TaskId,
    pub envs: Vec<EnvVar>,
}

impl Invocation {
    pub fn env(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A fake task entry point that:
/// - records which tasks were invoked and with which envs
/// - immediately reports success without running anything.
#[derive(Clone, Default)]
pub struct RecordingInvoker {
    calls: Arc<Mutex<Vec<Invocation>>>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<_> = self.calls().into_iter().map(|c| c.task_id).collect();
        ids.sort();
        ids
    }
}

impl TaskInvoker for RecordingInvoker {
    fn execute_task(&self, task_id: TaskId, extra_envs: Vec<EnvVar>) -> InvokeFuture<'_> {
        let calls = Arc::clone(&self.calls);
        Box::pin(async move {
            calls.lock().unwrap().push(Invocation {
                task_id,
                envs: extra_envs,
            });
            let now = Utc::now();
            Ok(ExecutionReport {
                result: ExecutionResult {
                    status: ExecStatus::Success,
                    exit_code: 0,
                    started_at: now,
                    finished_at: now,
                    duration_ms: 0,
                    error: None,
                    output: String::new(),
                    timed_out: false,
                    log_id: None,
                    command: format!("task-{task_id}"),
                },
                error: None,
                mode: None,
            })
        })
    }
}
