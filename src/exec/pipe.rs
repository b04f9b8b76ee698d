// src/exec/pipe.rs

//! Pipe backend: used on Windows, when separate streams are wanted, and as
//! the fallback when a PTY cannot be opened.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use crate::exec::process::{ProcessOutcome, ProcessSpec, copy_blocking, drain_copy};
use crate::livelog::sink::SharedSink;

/// A process with its output being copied by background routines.
pub struct PipeProcess {
    child: Child,
    copies: Vec<JoinHandle<()>>,
}

fn build_command(spec: &ProcessSpec) -> Command {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).stdin(Stdio::null()).kill_on_drop(true);
    if let Some(dir) = &spec.work_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &spec.envs {
        cmd.env(key, value);
    }
    cmd
}

/// Start `spec` with stdout and stderr attached to one OS pipe, so the two
/// streams interleave exactly as the child wrote them.
pub fn spawn_combined(spec: &ProcessSpec, sink: SharedSink) -> Result<PipeProcess> {
    let (reader, writer) = os_pipe::pipe().context("creating output pipe")?;
    let writer_err = writer.try_clone().context("duplicating output pipe")?;

    // The command owns the parent's copies of the write end; dropping it
    // right after spawn lets the reader see EOF when the child exits.
    let child = {
        let mut cmd = build_command(spec);
        cmd.stdout(writer).stderr(writer_err);
        cmd.spawn()
            .with_context(|| format!("spawning '{}'", spec.program))?
    };

    let copy = tokio::task::spawn_blocking(move || copy_blocking(reader, sink));

    Ok(PipeProcess {
        child,
        copies: vec![copy],
    })
}

/// Start `spec` with independent stdout and stderr pipes.
pub fn spawn_split(spec: &ProcessSpec, stdout: SharedSink, stderr: SharedSink) -> Result<PipeProcess> {
    let mut cmd = build_command(spec);
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning '{}'", spec.program))?;

    let mut copies = Vec::with_capacity(2);
    if let Some(out) = child.stdout.take() {
        copies.push(tokio::spawn(copy_async(out, stdout)));
    }
    if let Some(err) = child.stderr.take() {
        copies.push(tokio::spawn(copy_async(err, stderr)));
    }

    Ok(PipeProcess { child, copies })
}

async fn copy_async<R: AsyncRead + Unpin>(mut reader: R, sink: SharedSink) {
    let mut buf = vec![0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if let Err(e) = sink.write_chunk(&buf[..n]) {
                    warn!(error = %e, "failed to write process output to sink");
                }
            }
            Err(e) => {
                warn!(error = %e, "reading process output failed");
                break;
            }
        }
    }
}

impl PipeProcess {
    /// Wait for exit or kill the child at `deadline`.
    pub async fn wait(mut self, deadline: Instant) -> ProcessOutcome {
        let outcome = tokio::select! {
            status_res = self.child.wait() => match status_res {
                Ok(status) => ProcessOutcome::Exited {
                    code: status.code().unwrap_or(-1),
                    success: status.success(),
                },
                Err(e) => ProcessOutcome::WaitFailed(e.to_string()),
            },
            _ = tokio::time::sleep_until(deadline) => {
                if let Err(e) = self.child.kill().await {
                    warn!(error = %e, "failed to kill timed out process");
                }
                ProcessOutcome::TimedOut
            }
        };

        for copy in self.copies {
            drain_copy(copy).await;
        }
        outcome
    }
}
