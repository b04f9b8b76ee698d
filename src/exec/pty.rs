// src/exec/pty.rs

//! Pseudo-terminal backend (non-Windows).
//!
//! The child sees a real terminal, so interactive tools flush line by line.
//! Stdout and stderr arrive merged on the PTY master.

use anyhow::{Context, Result, bail};
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize, native_pty_system};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use crate::exec::process::{ProcessOutcome, ProcessSpec, copy_blocking, drain_copy};
use crate::livelog::sink::SharedSink;

const PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 120,
    pixel_width: 0,
    pixel_height: 0,
};

/// A process running attached to a PTY.
pub struct PtyProcess {
    child: Box<dyn Child + Send + Sync>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    master: Box<dyn MasterPty + Send>,
    copy: JoinHandle<()>,
}

/// Open a PTY and start `spec` on it, copying the master side into `sink`.
///
/// With `enabled = false` this fails immediately, exactly like a host
/// without pseudo-terminal support.
pub fn spawn(spec: &ProcessSpec, sink: SharedSink, enabled: bool) -> Result<PtyProcess> {
    if !enabled {
        bail!("pseudo-terminal support is disabled");
    }

    let pair = native_pty_system()
        .openpty(PTY_SIZE)
        .context("opening pseudo-terminal")?;

    let mut cmd = CommandBuilder::new(&spec.program);
    cmd.args(&spec.args);
    if let Some(dir) = &spec.work_dir {
        cmd.cwd(dir);
    }
    for (key, value) in &spec.envs {
        cmd.env(key, value);
    }

    let child = pair
        .slave
        .spawn_command(cmd)
        .with_context(|| format!("spawning '{}' on pseudo-terminal", spec.program))?;
    // Only the child may hold the slave side, otherwise the master never
    // sees EOF.
    drop(pair.slave);

    let killer = child.clone_killer();
    let reader = pair
        .master
        .try_clone_reader()
        .context("cloning pseudo-terminal reader")?;
    let copy = tokio::task::spawn_blocking(move || copy_blocking(reader, sink));

    Ok(PtyProcess {
        child,
        killer,
        master: pair.master,
        copy,
    })
}

impl PtyProcess {
    /// Wait for exit or kill the child at `deadline`.
    pub async fn wait(self, deadline: Instant) -> ProcessOutcome {
        let PtyProcess {
            mut child,
            mut killer,
            master,
            copy,
        } = self;

        let mut wait = tokio::task::spawn_blocking(move || child.wait());

        let outcome = tokio::select! {
            res = &mut wait => match res {
                Ok(Ok(status)) => ProcessOutcome::Exited {
                    code: status.exit_code() as i32,
                    success: status.success(),
                },
                Ok(Err(e)) => ProcessOutcome::WaitFailed(e.to_string()),
                Err(e) => ProcessOutcome::WaitFailed(e.to_string()),
            },
            _ = tokio::time::sleep_until(deadline) => {
                if let Err(e) = killer.kill() {
                    warn!(error = %e, "failed to kill timed out PTY process");
                }
                let _ = wait.await;
                ProcessOutcome::TimedOut
            }
        };

        drop(master);
        drain_copy(copy).await;
        outcome
    }
}
