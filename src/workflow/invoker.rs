// src/workflow/invoker.rs

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::exec::ExecutionReport;
use crate::types::{EnvVar, TaskId};

pub type InvokeFuture<'a> = Pin<Box<dyn Future<Output = Result<ExecutionReport>> + Send + 'a>>;

/// The task-level entry point the engine dispatches into.
///
/// Implemented by [`TaskService`](crate::service::TaskService); tests swap
/// in a recording fake.
pub trait TaskInvoker: Send + Sync {
    /// Run task `task_id` with `extra_envs` layered over the task's own envs.
    fn execute_task(&self, task_id: TaskId, extra_envs: Vec<EnvVar>) -> InvokeFuture<'_>;
}
