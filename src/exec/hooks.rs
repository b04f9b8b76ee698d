// src/exec/hooks.rs

//! Hook protocol the executor drives around each execution.
//!
//! For one execution the calls are strictly ordered:
//! `pre_execute` → zero or more `on_heartbeat` → `post_execute`.
//! Implementations live outside the executor (see
//! [`crate::service::PersistingHooks`]) and are injected per call.

use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::exec::request::{ExecutionRequest, ExecutionResult};
use crate::types::LogId;

/// Boxed future returned by hook methods.
pub type HookFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

pub trait Hooks: Send + Sync {
    /// Called before spawning. Returns the log ID output is captured under;
    /// an error aborts the execution without spawning anything.
    fn pre_execute<'a>(&'a self, request: &'a ExecutionRequest) -> HookFuture<'a, LogId>;

    /// Called periodically while the process runs.
    fn on_heartbeat(&self, log_id: LogId, elapsed_ms: u64) -> HookFuture<'_, ()>;

    /// Called exactly once after the process finished (or failed to start,
    /// or timed out). Errors are recorded but never change the status.
    fn post_execute<'a>(&'a self, log_id: LogId, result: &'a ExecutionResult)
    -> HookFuture<'a, ()>;
}
