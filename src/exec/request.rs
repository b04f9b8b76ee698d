// src/exec/request.rs

//! Execution request/result types and executor options.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EnvVar, ExecStatus, LogId};

/// Default execution timeout when a request asks for `<= 0` minutes.
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 30;

/// Upper bound on any timeout, about a century.
pub const MAX_TIMEOUT_MINUTES: u64 = 100 * 365 * 24 * 60;

/// `minutes` as a timeout, clamped to [`MAX_TIMEOUT_MINUTES`].
pub fn timeout_from_minutes(minutes: u64) -> Duration {
    Duration::from_secs(minutes.min(MAX_TIMEOUT_MINUTES) * 60)
}

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);

/// One language pinned through the version manager, e.g. `python@3.12`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl LanguageSpec {
    pub fn new(name: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            name: name.into(),
            version: version.map(str::to_string),
        }
    }
}

/// What to run. Treated as immutable once execution starts; the only
/// rewrite (version-manager wrapping) happens before `PreExecute`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// Shell command line.
    pub command: String,
    /// Working directory; `None` runs in the current directory.
    pub work_dir: Option<PathBuf>,
    /// Variables layered on top of the inherited host environment.
    pub envs: Vec<EnvVar>,
    /// Timeout in minutes; `<= 0` means the default (30 minutes).
    pub timeout_minutes: i64,
    /// Precise deadline that takes precedence over `timeout_minutes`.
    pub timeout_override: Option<Duration>,
    /// Languages to route the command through the version manager with.
    pub languages: Vec<LanguageSpec>,
    /// Whether `languages` should be applied at all.
    pub use_version_manager: bool,
    /// Merge stdout and stderr into a single stream.
    pub combined_output: bool,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            combined_output: true,
            ..Self::default()
        }
    }

    /// Effective timeout, normalising `<= 0` to `default`.
    pub fn effective_timeout(&self, default: Duration) -> Duration {
        if let Some(d) = self.timeout_override {
            return d;
        }
        if self.timeout_minutes <= 0 {
            default
        } else {
            timeout_from_minutes(self.timeout_minutes as u64)
        }
    }
}

/// Outcome of one execution. Produced exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecStatus,
    pub exit_code: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Error text for failed executions.
    pub error: Option<String>,
    /// Executor-level notes (system errors, hook errors, demo notice).
    pub output: String,
    /// Set when the deadline expired, as opposed to a plain non-zero exit.
    pub timed_out: bool,
    /// Log the process output was captured under, if hooks were supplied.
    pub log_id: Option<LogId>,
    /// The command that actually ran, after any rewriting.
    pub command: String,
}

impl ExecutionResult {
    pub(crate) fn failed(command: &str, started_at: DateTime<Utc>, exit_code: i32) -> Self {
        let finished_at = Utc::now();
        Self {
            status: ExecStatus::Failed,
            exit_code,
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
            error: None,
            output: String::new(),
            timed_out: false,
            log_id: None,
            command: command.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecStatus::Success
    }

    /// Append a note to `output` on its own line.
    pub fn append_output(&mut self, note: &str) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.output.push_str(note);
    }
}

pub(crate) fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

/// Executor-wide settings.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Used when a request's timeout is `<= 0`.
    pub default_timeout: Duration,
    /// Period between `OnHeartbeat` calls.
    pub heartbeat_interval: Duration,
    /// Demo/dry-run: run hooks but never spawn anything.
    pub demo_mode: bool,
    /// Version manager executable used for language wrapping.
    pub version_manager: String,
    /// Try a pseudo-terminal for merged output. When off, merged output
    /// takes the pipe fallback path directly.
    pub use_pty: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            default_timeout: timeout_from_minutes(DEFAULT_TIMEOUT_MINUTES),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            demo_mode: false,
            version_manager: "mise".to_string(),
            use_pty: true,
        }
    }
}
