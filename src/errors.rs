// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Execution-level failures (`Spawn`, `Timeout`, `NonZeroExit`) always show
//! up in an [`ExecutionResult`](crate::exec::ExecutionResult) status as well;
//! the error value is only the "hard" side channel for the caller.

use thiserror::Error;

use crate::types::{LogId, TaskId};

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to parse workflow graph for '{workflow}': {source}")]
    FlowParse {
        workflow: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Workflow '{0}' is disabled or has an empty graph")]
    WorkflowUnavailable(String),

    #[error("Workflow '{0}' has no root node to start from")]
    NoRootNode(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Execution timed out after {after:?}")]
    Timeout { after: std::time::Duration },

    #[error("Process exited with code {0}")]
    NonZeroExit(i32),

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("Live log {0} is closed")]
    LogClosed(LogId),

    #[error("Live log {0} not found")]
    LogNotFound(LogId),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PanelError {
    /// True for errors that mean "the thing you asked for does not exist or
    /// cannot be started", as opposed to failures while running it.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PanelError::TaskNotFound(_)
                | PanelError::WorkflowNotFound(_)
                | PanelError::WorkflowUnavailable(_)
                | PanelError::NoRootNode(_)
                | PanelError::LogNotFound(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PanelError>;
