// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{ExecutorOptions, LanguageSpec, timeout_from_minutes};
use crate::livelog::LogRegistryOptions;
use crate::store::TaskDef;
use crate::types::{TaskId, parse_env_vars, split_env};
use crate::workflow::EngineOptions;

/// Panel file as read from TOML, before validation.
///
/// ```toml
/// [engine]
/// default_timeout_minutes = 30
/// env_prefix = "PANEL"
///
/// [task.1]
/// name = "build"
/// cmd = "make all"
/// envs = ["PROFILE=release"]
///
/// [task.2]
/// name = "wait"
/// tags = "delay"
///
/// [workflow.nightly]
/// name = "Nightly"
/// flow_file = "flows/nightly.json"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawPanelFile {
    #[serde(default)]
    pub engine: EngineSection,

    /// Keyed by task ID (TOML keys are strings; validated as integers).
    #[serde(default)]
    pub task: BTreeMap<String, TaskSection>,

    #[serde(default)]
    pub workflow: BTreeMap<String, WorkflowSection>,
}

/// Validated panel file. Construct via `TryFrom<RawPanelFile>`.
#[derive(Debug, Clone)]
pub struct PanelFile {
    pub engine: EngineSection,
    pub tasks: BTreeMap<TaskId, TaskSection>,
    pub workflows: BTreeMap<String, WorkflowSection>,
}

impl PanelFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        tasks: BTreeMap<TaskId, TaskSection>,
        workflows: BTreeMap<String, WorkflowSection>,
    ) -> Self {
        Self {
            engine,
            tasks,
            workflows,
        }
    }

    /// Tasks as the store holds them.
    pub fn task_defs(&self) -> Vec<TaskDef> {
        self.tasks
            .iter()
            .map(|(id, t)| t.to_task_def(*id))
            .collect()
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub default_timeout_minutes: u64,
    pub heartbeat_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub subscriber_capacity: usize,
    pub tail_window_bytes: u64,
    pub max_concurrent_dispatches: usize,
    /// Never spawn; record every execution as disabled.
    pub demo_mode: bool,
    pub env_prefix: String,
    pub version_manager: String,
    /// Try a PTY first for merged output (non-Windows only).
    pub use_pty: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            default_timeout_minutes: crate::exec::DEFAULT_TIMEOUT_MINUTES,
            heartbeat_interval_ms: 3000,
            settle_delay_ms: 1000,
            subscriber_capacity: crate::livelog::DEFAULT_SUBSCRIBER_CAPACITY,
            tail_window_bytes: crate::livelog::DEFAULT_TAIL_WINDOW_BYTES,
            max_concurrent_dispatches: crate::workflow::DEFAULT_MAX_CONCURRENT_DISPATCHES,
            demo_mode: false,
            env_prefix: crate::workflow::DEFAULT_ENV_PREFIX.to_string(),
            version_manager: "mise".to_string(),
            use_pty: true,
        }
    }
}

impl EngineSection {
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            default_timeout: timeout_from_minutes(self.default_timeout_minutes),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            demo_mode: self.demo_mode,
            version_manager: self.version_manager.clone(),
            use_pty: self.use_pty,
        }
    }

    pub fn registry_options(&self) -> LogRegistryOptions {
        LogRegistryOptions {
            subscriber_capacity: self.subscriber_capacity,
            tail_window_bytes: self.tail_window_bytes,
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            env_prefix: self.env_prefix.clone(),
        }
    }
}

/// `[task.<id>]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskSection {
    #[serde(default)]
    pub name: String,

    /// Shell command. May be empty for control tasks (those with `tags`).
    #[serde(default)]
    pub cmd: String,

    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// `KEY=VALUE` entries.
    #[serde(default)]
    pub envs: Vec<String>,

    /// Legacy comma-joined form, `"A=1,B=x{{COMMA}}y"`. Applied before `envs`.
    #[serde(default)]
    pub env: Option<String>,

    /// Minutes; 0 or absent means the engine default.
    #[serde(default)]
    pub timeout: i64,

    #[serde(default)]
    pub languages: Vec<LanguageEntry>,

    #[serde(default)]
    pub use_version_manager: bool,

    /// Control sub-type for control nodes, e.g. `"delay"`.
    #[serde(default)]
    pub tags: Option<String>,
}

impl TaskSection {
    pub fn is_control(&self) -> bool {
        self.tags.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn to_task_def(&self, id: TaskId) -> TaskDef {
        TaskDef {
            id,
            name: if self.name.is_empty() {
                format!("task-{id}")
            } else {
                self.name.clone()
            },
            command: self.cmd.clone(),
            work_dir: self.work_dir.clone(),
            envs: self
                .env
                .as_deref()
                .map(parse_env_vars)
                .unwrap_or_default()
                .into_iter()
                .chain(self.envs.iter().filter_map(|e| split_env(e)))
                .collect(),
            timeout_minutes: self.timeout,
            languages: self
                .languages
                .iter()
                .map(|l| LanguageSpec::new(&l.name, l.version.as_deref()))
                .collect(),
            use_version_manager: self.use_version_manager,
            tags: self.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LanguageEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// `[workflow.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowSection {
    #[serde(default)]
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Inline JSON graph payload.
    #[serde(default)]
    pub flow: Option<String>,

    /// Graph payload file, relative to the panel file.
    #[serde(default)]
    pub flow_file: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}
