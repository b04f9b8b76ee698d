// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

use crate::types::{EnvVar, split_env};

/// Command-line arguments for `taskdeck`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskdeck",
    version,
    about = "Run panel tasks and chain them through workflow graphs.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the panel file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Trigger this workflow and wait until the run goes idle.
    #[arg(long, value_name = "ID", conflicts_with = "task")]
    pub workflow: Option<String>,

    /// Run this task (streaming its output) and any workflow hops it fires.
    #[arg(long, value_name = "ID")]
    pub task: Option<i64>,

    /// Extra environment variable for the triggered run. Repeatable.
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_arg)]
    pub envs: Vec<EnvVar>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKDECK_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Record executions without spawning anything.
    #[arg(long)]
    pub demo: bool,

    /// Parse + validate the panel file, print it, execute nothing.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_env_arg(s: &str) -> Result<EnvVar, String> {
    split_env(s).ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeatable_env_flags() {
        let args = CliArgs::try_parse_from([
            "taskdeck", "--task", "3", "--env", "A=1", "--env", "B=x=y",
        ])
        .unwrap();
        assert_eq!(args.task, Some(3));
        assert_eq!(
            args.envs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "x=y".to_string())
            ]
        );
    }

    #[test]
    fn env_flag_requires_equals() {
        assert!(CliArgs::try_parse_from(["taskdeck", "--env", "NOPE"]).is_err());
    }

    #[test]
    fn workflow_and_task_conflict() {
        assert!(CliArgs::try_parse_from(["taskdeck", "--workflow", "w", "--task", "1"]).is_err());
    }

    #[test]
    fn config_defaults_to_panel_file_in_cwd() {
        let args = CliArgs::try_parse_from(["taskdeck", "--dry-run"]).unwrap();
        assert_eq!(args.config, default_config_path());

        let args = CliArgs::try_parse_from(["taskdeck", "--config", "ops/panel.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("ops/panel.toml"));
    }
}
