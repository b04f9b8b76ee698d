// src/exec/process.rs

//! Shared process plumbing for the PTY and pipe backends.

use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::livelog::sink::SharedSink;
use crate::types::EnvVar;

/// Markers forced into every child environment so line-buffered and
/// TTY-sensitive tools stream output under redirection.
pub const FORCED_ENV: &[(&str, &str)] = &[
    ("TERM", "xterm"),
    ("PYTHONUNBUFFERED", "1"),
    ("NODE_NO_WARNINGS", "1"),
];

/// How long to wait for output copying to finish after the process exited.
///
/// Background grandchildren can keep the output fd open forever; after this
/// grace period the copy routine is detached.
pub const COPY_GRACE: Duration = Duration::from_secs(2);

/// Fully resolved process description shared by both backends.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub work_dir: Option<PathBuf>,
    /// Applied on top of the inherited host environment, in order.
    pub envs: Vec<EnvVar>,
}

impl ProcessSpec {
    /// Build a shell invocation appropriate for the platform.
    pub fn shell(command: &str, work_dir: Option<PathBuf>, request_envs: &[EnvVar]) -> Self {
        let (program, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut envs: Vec<EnvVar> = request_envs.to_vec();
        envs.extend(
            FORCED_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        );

        let work_dir = work_dir.filter(|d| !d.as_os_str().is_empty());

        Self {
            program: program.to_string(),
            args: vec![flag.to_string(), command.to_string()],
            work_dir,
            envs,
        }
    }
}

/// How a process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Exited { code: i32, success: bool },
    TimedOut,
    WaitFailed(String),
}

/// Copy everything from a blocking reader into `sink` until EOF.
///
/// Sink errors are logged and the copy keeps draining so the child never
/// blocks on a full pipe. Read errors end the copy (a PTY master reports
/// `EIO` once the child side is gone).
pub fn copy_blocking<R: Read>(mut reader: R, sink: SharedSink) {
    let mut buf = [0u8; 8192];
    let mut sink_failed = false;
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = sink.write_chunk(&buf[..n]) {
                    if !sink_failed {
                        warn!(error = %e, "failed to write process output to sink");
                        sink_failed = true;
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "output reader finished with error");
                break;
            }
        }
    }
}

/// Wait for an output copy routine, detaching it after [`COPY_GRACE`].
pub async fn drain_copy(handle: JoinHandle<()>) {
    match tokio::time::timeout(COPY_GRACE, handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "output copy task panicked"),
        Err(_) => debug!("output still open after process exit; detaching copy routine"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_spec_appends_forced_env_last() {
        let spec = ProcessSpec::shell(
            "echo hi",
            Some(PathBuf::new()),
            &[("TERM".to_string(), "dumb".to_string())],
        );
        assert!(spec.work_dir.is_none());
        assert_eq!(spec.envs.first().map(|(k, _)| k.as_str()), Some("TERM"));
        assert_eq!(
            spec.envs.iter().rev().find(|(k, _)| k == "TERM").map(|(_, v)| v.as_str()),
            Some("xterm")
        );
    }
}
