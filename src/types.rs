// src/types.rs

//! Small shared types: identifiers, statuses and env-var helpers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a registered task.
pub type TaskId = i64;

/// Identifier of a workflow definition.
pub type WorkflowId = String;

/// A single environment variable override, `(KEY, VALUE)`.
pub type EnvVar = (String, String);

/// Execution-scoped log identifier, minted by `PreExecute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogId(pub u64);

impl fmt::Display for LogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LogId {
    fn from(v: u64) -> Self {
        LogId(v)
    }
}

/// Status of an execution or of a persisted completion record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    /// Still in progress; never propagates through workflows.
    Running,
    Success,
    Failed,
}

impl ExecStatus {
    /// Terminal states are the only ones that trigger downstream edges.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecStatus::Success | ExecStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecStatus::Running => "running",
            ExecStatus::Success => "success",
            ExecStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "running" => Ok(ExecStatus::Running),
            "success" => Ok(ExecStatus::Success),
            "failed" => Ok(ExecStatus::Failed),
            other => Err(format!(
                "invalid status: {other} (expected \"running\", \"success\" or \"failed\")"
            )),
        }
    }
}

/// Split a `KEY=VALUE` string into its parts. Returns `None` if there is no
/// `=` or the key is empty.
pub fn split_env(pair: &str) -> Option<EnvVar> {
    let (key, value) = pair.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

/// Parse the legacy comma-joined env string `KEY1=VALUE1,KEY2=VALUE2`.
///
/// Literal commas and equals signs inside values are stored escaped as
/// `{{COMMA}}` and `{{EQUAL}}`.
pub fn parse_env_vars(env_str: &str) -> Vec<EnvVar> {
    env_str
        .split(',')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.replace("{{COMMA}}", ",").replace("{{EQUAL}}", "=");
            Some((key.to_string(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_env_string_with_escapes() {
        let envs = parse_env_vars("A=1,,B=x{{COMMA}}y,C=k{{EQUAL}}v,broken");
        assert_eq!(
            envs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x,y".to_string()),
                ("C".to_string(), "k=v".to_string()),
            ]
        );
    }

    #[test]
    fn only_success_and_failed_are_terminal() {
        assert!(ExecStatus::Success.is_terminal());
        assert!(ExecStatus::Failed.is_terminal());
        assert!(!ExecStatus::Running.is_terminal());
        assert_eq!("FAILED".parse::<ExecStatus>(), Ok(ExecStatus::Failed));
    }
}
