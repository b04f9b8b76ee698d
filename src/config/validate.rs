// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{PanelFile, RawPanelFile, TaskSection};
use crate::errors::{PanelError, Result};
use crate::types::TaskId;

impl TryFrom<RawPanelFile> for PanelFile {
    type Error = PanelError;

    fn try_from(raw: RawPanelFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        validate_engine(&raw)?;
        let tasks = parse_task_ids(&raw)?;
        validate_tasks(&tasks)?;
        validate_workflows(&raw)?;
        // Graph payloads are left unparsed here: a broken graph must only
        // take its own workflow out at evaluation time.
        Ok(PanelFile::new_unchecked(raw.engine, tasks, raw.workflow))
    }
}

fn ensure_has_tasks(cfg: &RawPanelFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PanelError::ConfigError(
            "panel file must contain at least one [task.<id>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_engine(cfg: &RawPanelFile) -> Result<()> {
    let e = &cfg.engine;
    let positive = [
        ("subscriber_capacity", e.subscriber_capacity as u64),
        ("tail_window_bytes", e.tail_window_bytes),
        ("max_concurrent_dispatches", e.max_concurrent_dispatches as u64),
        ("heartbeat_interval_ms", e.heartbeat_interval_ms),
    ];
    for (name, value) in positive {
        if value == 0 {
            return Err(PanelError::ConfigError(format!(
                "[engine].{name} must be >= 1 (got 0)"
            )));
        }
    }

    let prefix = e.env_prefix.as_str();
    let valid_prefix = prefix
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_prefix {
        return Err(PanelError::ConfigError(format!(
            "[engine].env_prefix must be a valid variable name (got '{prefix}')"
        )));
    }

    if e.version_manager.trim().is_empty() {
        return Err(PanelError::ConfigError(
            "[engine].version_manager must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn parse_task_ids(cfg: &RawPanelFile) -> Result<BTreeMap<TaskId, TaskSection>> {
    cfg.task
        .iter()
        .map(|(key, task)| match key.trim().parse::<TaskId>() {
            Ok(id) if id > 0 => Ok((id, task.clone())),
            _ => Err(PanelError::ConfigError(format!(
                "task key '{key}' must be a positive integer ID"
            ))),
        })
        .collect()
}

fn validate_tasks(tasks: &BTreeMap<TaskId, TaskSection>) -> Result<()> {
    for (id, task) in tasks {
        if task.cmd.trim().is_empty() && !task.is_control() {
            return Err(PanelError::ConfigError(format!(
                "task {id} has an empty `cmd` and is not a control task"
            )));
        }
        if let Some(bad) = task.envs.iter().find(|e| !e.contains('=')) {
            return Err(PanelError::ConfigError(format!(
                "task {id} has env entry '{bad}' without '='"
            )));
        }
    }
    Ok(())
}

fn validate_workflows(cfg: &RawPanelFile) -> Result<()> {
    for (id, wf) in cfg.workflow.iter() {
        if wf.flow.is_some() && wf.flow_file.is_some() {
            return Err(PanelError::ConfigError(format!(
                "workflow '{id}' sets both `flow` and `flow_file`"
            )));
        }
    }
    Ok(())
}
