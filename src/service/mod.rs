// src/service/mod.rs

//! Task-level services built on the executor: the `ExecuteTask` entry
//! point, persistence-backed hooks and the live log follower.

pub mod follow;
pub mod hooks;
pub mod task_service;

pub use follow::{FollowOutcome, follow_log};
pub use hooks::PersistingHooks;
pub use task_service::{DEFAULT_HISTORY_LIMIT, TaskRun, TaskService};
