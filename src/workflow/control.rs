// src/workflow/control.rs

//! Control nodes: graph nodes that stand for a meta-operation rather than a
//! runnable command.

use std::time::Duration;

use crate::store::TaskDef;
use crate::workflow::graph::NodeTarget;

/// Delay used when a delay node has no usable configuration.
pub const DEFAULT_DELAY_SECONDS: u64 = 5;

/// What a dispatched node does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Run the referenced task through the task entry point.
    Task,
    /// Wait, then complete successfully.
    Delay { seconds: u64 },
    /// A control sub-type this engine does not know; completes immediately.
    UnknownControl(String),
}

impl NodeKind {
    /// Resolve a node. The control sub-type comes from the node's
    /// `controlType`, falling back to the referenced task's tags.
    pub fn resolve(target: &NodeTarget, task: Option<&TaskDef>) -> Self {
        let Some(spec) = &target.control else {
            return NodeKind::Task;
        };

        let sub_type = if spec.control_type.is_empty() {
            task.and_then(|t| t.tags.as_deref())
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        } else {
            spec.control_type.clone()
        };

        match sub_type.to_ascii_lowercase().as_str() {
            "delay" => NodeKind::Delay {
                seconds: parse_delay_seconds(&spec.config),
            },
            _ => NodeKind::UnknownControl(sub_type),
        }
    }

    pub fn is_control(&self) -> bool {
        !matches!(self, NodeKind::Task)
    }
}

/// Leading integer of `config`, in seconds. Negative values clamp to zero;
/// empty or non-numeric input gives [`DEFAULT_DELAY_SECONDS`].
pub fn parse_delay_seconds(config: &str) -> u64 {
    let s = config.trim_start();
    let sign_len = usize::from(s.starts_with(['-', '+']));
    let digits = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return DEFAULT_DELAY_SECONDS;
    }
    match s[..sign_len + digits].parse::<i64>() {
        Ok(n) => n.max(0) as u64,
        Err(_) => DEFAULT_DELAY_SECONDS,
    }
}

/// Output stored on a completed delay node's record.
pub fn delay_output(seconds: u64) -> String {
    format!("Wait completed after {seconds} seconds.")
}

pub fn delay_duration(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}
