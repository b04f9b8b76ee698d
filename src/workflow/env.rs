// src/workflow/env.rs

//! Environment-variable conventions between workflow hops.
//!
//! With the default prefix `PANEL`:
//!
//! - `PANEL_WF_ID`, `PANEL_WF_RUN_ID`: workflow identity, set on every
//!   workflow-driven execution.
//! - `PANEL_WF_TRIGGER=manual`: set on root executions of a manual trigger.
//! - An upstream output line `PANEL_OUT_FILE=/tmp/x` becomes `PANEL_FILE=/tmp/x`
//!   for the downstream task.

use std::fmt;

use chrono::Utc;
use regex::Regex;
use uuid::Uuid;

use crate::errors::{PanelError, Result};
use crate::types::{EnvVar, WorkflowId};

pub const DEFAULT_ENV_PREFIX: &str = "PANEL";

/// Correlation ID for one workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// `WF-RUN-<unix millis>-<8 hex>`.
    pub fn mint() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        RunId(format!(
            "WF-RUN-{}-{}",
            Utc::now().timestamp_millis(),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        RunId(s)
    }
}

/// Workflow identity carried by an execution's environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowContext {
    pub workflow_id: WorkflowId,
    pub run_id: String,
}

/// Variable names derived from one prefix.
#[derive(Debug, Clone)]
pub struct EnvNames {
    prefix: String,
    capture: Regex,
}

impl EnvNames {
    pub fn new(prefix: &str) -> Result<Self> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(PanelError::ConfigError(
                "environment prefix must not be empty".to_string(),
            ));
        }
        let pattern = format!(r"^{}_OUT_([^=\s]+)=(.*)$", regex::escape(prefix));
        let capture = Regex::new(&pattern)
            .map_err(|e| PanelError::ConfigError(format!("invalid environment prefix: {e}")))?;
        Ok(Self {
            prefix: prefix.to_string(),
            capture,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn wf_id(&self) -> String {
        format!("{}_WF_ID", self.prefix)
    }

    pub fn wf_run_id(&self) -> String {
        format!("{}_WF_RUN_ID", self.prefix)
    }

    pub fn wf_trigger(&self) -> String {
        format!("{}_WF_TRIGGER", self.prefix)
    }

    /// Identity variables for a hop of `workflow_id` in run `run_id`.
    pub fn identity(&self, workflow_id: &str, run_id: &RunId) -> Vec<EnvVar> {
        vec![
            (self.wf_id(), workflow_id.to_string()),
            (self.wf_run_id(), run_id.to_string()),
        ]
    }

    /// Output-capture lines from an upstream task's (decompressed) output.
    pub fn capture_outputs(&self, output: &str) -> Vec<EnvVar> {
        output
            .lines()
            .filter_map(|line| {
                let caps = self.capture.captures(line.trim())?;
                Some((
                    format!("{}_{}", self.prefix, &caps[1]),
                    caps[2].to_string(),
                ))
            })
            .collect()
    }

    /// Read the workflow identity back out of an execution's env overrides.
    ///
    /// Later entries win, matching how the variables reach the process.
    pub fn context_from(&self, envs: &[EnvVar]) -> Option<WorkflowContext> {
        let lookup = |key: String| {
            envs.iter()
                .rev()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };
        Some(WorkflowContext {
            workflow_id: lookup(self.wf_id())?,
            run_id: lookup(self.wf_run_id())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_prefixed_output_lines() {
        let names = EnvNames::new("PANEL").unwrap();
        let out = "building\n  PANEL_OUT_FILE=/tmp/a.txt  \nPANEL_OUT_EMPTY=\nOTHER_OUT_X=1\nPANEL_OUT_=bad\n";
        assert_eq!(
            names.capture_outputs(out),
            vec![
                ("PANEL_FILE".to_string(), "/tmp/a.txt".to_string()),
                ("PANEL_EMPTY".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn context_round_trips_through_env() {
        let names = EnvNames::new("PANEL").unwrap();
        let run = RunId::from("WF-RUN-1-abcdef01".to_string());
        let mut envs = names.identity("wf-1", &run);
        envs.push(("OTHER".into(), "x".into()));

        let ctx = names.context_from(&envs).unwrap();
        assert_eq!(ctx.workflow_id, "wf-1");
        assert_eq!(ctx.run_id, "WF-RUN-1-abcdef01");
        assert!(names.context_from(&[]).is_none());
    }

    #[test]
    fn minted_run_ids_are_distinct() {
        let a = RunId::mint();
        let b = RunId::mint();
        assert!(a.as_str().starts_with("WF-RUN-"));
        assert_ne!(a, b);
    }
}
