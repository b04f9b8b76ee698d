// src/exec/executor.rs

//! The command executor: one shell command in, one [`ExecutionResult`] out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::errors::PanelError;
use crate::exec::hooks::Hooks;
use crate::exec::{pipe, pty};
use crate::exec::process::{ProcessOutcome, ProcessSpec};
use crate::exec::request::{ExecutionRequest, ExecutionResult, ExecutorOptions, elapsed_ms};
use crate::exec::streams::{Streams, with_capture};
use crate::exec::version_manager::wrap_command;
use crate::livelog::{LiveLog, LogRegistry, SharedSink};
use crate::types::{ExecStatus, LogId};

/// Notice written to the caller's stream when demo mode skips a command.
pub const DEMO_NOTICE: &str = "\r\n\x1b[1;33m[demo mode] command execution skipped\x1b[0m\r\n";

/// Result text recorded for executions skipped by demo mode.
pub const DEMO_OUTPUT: &str = "[demo mode] this task is disabled in demo mode";

/// Streaming mode actually used for an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Pty,
    /// stdout and stderr share one OS pipe.
    CombinedPipe,
    /// Independent stdout and stderr pipes.
    SplitPipe,
}

/// The result plus any hard execution error for the caller to react to.
#[derive(Debug)]
pub struct ExecutionReport {
    pub result: ExecutionResult,
    pub error: Option<PanelError>,
    /// `None` when nothing was spawned.
    pub mode: Option<StreamMode>,
}

enum Running {
    Pty(pty::PtyProcess),
    Pipe(pipe::PipeProcess),
}

impl Running {
    async fn wait(self, deadline: Instant) -> ProcessOutcome {
        match self {
            Running::Pty(p) => p.wait(deadline).await,
            Running::Pipe(p) => p.wait(deadline).await,
        }
    }
}

/// Spawns processes, streams their output and drives the hook protocol.
///
/// Holds no state shared between executions apart from the live log
/// registry, so one executor can run any number of executions in parallel.
#[derive(Debug, Clone)]
pub struct Executor {
    registry: Arc<LogRegistry>,
    options: ExecutorOptions,
}

impl Executor {
    pub fn new(registry: Arc<LogRegistry>, options: ExecutorOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<LogRegistry> {
        &self.registry
    }

    /// Run one request.
    ///
    /// `PostExecute` is called exactly once whenever `PreExecute` succeeded,
    /// including on spawn failure and timeout.
    pub async fn execute(
        &self,
        mut request: ExecutionRequest,
        streams: Streams,
        hooks: Option<Arc<dyn Hooks>>,
    ) -> ExecutionReport {
        let started_at = Utc::now();

        if request.command.trim().is_empty() {
            let mut result = ExecutionResult::failed(&request.command, started_at, 1);
            result.error = Some("empty command".to_string());
            return ExecutionReport {
                result,
                error: Some(PanelError::Spawn("empty command".to_string())),
                mode: None,
            };
        }

        // Rewrite first so PreExecute records exactly what runs.
        if request.use_version_manager {
            request.command =
                wrap_command(&self.options.version_manager, &request.command, &request.languages);
            request.use_version_manager = false;
        }

        if self.options.demo_mode {
            return self.execute_demo(request, streams, hooks, started_at).await;
        }

        let timeout = request.effective_timeout(self.options.default_timeout);
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365));

        let log_id = match &hooks {
            Some(h) => match h.pre_execute(&request).await {
                Ok(id) => Some(id),
                Err(e) => {
                    error!(command = %request.command, error = %e, "pre-execute hook failed; not spawning");
                    let mut result = ExecutionResult::failed(&request.command, started_at, 1);
                    result.error = Some(e.to_string());
                    return ExecutionReport {
                        result,
                        error: Some(PanelError::Hook(e.to_string())),
                        mode: None,
                    };
                }
            },
            None => None,
        };

        let live_log = log_id.and_then(|id| self.open_live_log(id));
        let capture: Option<SharedSink> = live_log.clone().map(|l| l as SharedSink);

        let combined = request.combined_output || streams.is_combined();
        let spec = ProcessSpec::shell(&request.command, request.work_dir.clone(), &request.envs);

        let spawned = self.spawn(&spec, &streams, capture.as_ref(), combined, log_id);

        let (running, mode) = match spawned {
            Ok(pair) => pair,
            Err(e) => {
                error!(log_id = ?log_id, command = %request.command, error = %e, "failed to start process");
                let mut result = ExecutionResult::failed(&request.command, started_at, 1);
                result.log_id = log_id;
                result.error = Some(format!("{e:#}"));
                if hooks.is_some() {
                    result.append_output(&format!("[system error] {e:#}"));
                }
                self.finish(&mut result, hooks.as_deref(), log_id, live_log.as_deref())
                    .await;
                return ExecutionReport {
                    result,
                    error: Some(PanelError::Spawn(format!("{e:#}"))),
                    mode: None,
                };
            }
        };

        info!(log_id = ?log_id, mode = ?mode, timeout = ?timeout, "process started");

        let heartbeat = match (&hooks, log_id) {
            (Some(h), Some(id)) => Some(spawn_heartbeat(
                Arc::clone(h),
                id,
                self.options.heartbeat_interval,
            )),
            _ => None,
        };

        let outcome = running.wait(deadline).await;

        if let Some((stop, handle)) = heartbeat {
            let _ = stop.send(());
            if let Err(e) = handle.await {
                warn!(error = %e, "heartbeat task panicked");
            }
        }

        let finished_at = Utc::now();
        let mut result = ExecutionResult {
            status: ExecStatus::Success,
            exit_code: 0,
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
            error: None,
            output: String::new(),
            timed_out: false,
            log_id,
            command: request.command.clone(),
        };

        let error = match outcome {
            ProcessOutcome::Exited { success: true, .. } => None,
            ProcessOutcome::Exited { code, .. } => {
                result.status = ExecStatus::Failed;
                result.exit_code = if code == 0 { 1 } else { code };
                let err = PanelError::NonZeroExit(result.exit_code);
                result.error = Some(err.to_string());
                Some(err)
            }
            ProcessOutcome::TimedOut => {
                result.status = ExecStatus::Failed;
                result.exit_code = -1;
                result.timed_out = true;
                let err = PanelError::Timeout { after: timeout };
                result.error = Some(err.to_string());
                Some(err)
            }
            ProcessOutcome::WaitFailed(msg) => {
                result.status = ExecStatus::Failed;
                result.exit_code = 1;
                result.error = Some(msg.clone());
                Some(PanelError::Spawn(msg))
            }
        };

        info!(
            log_id = ?log_id,
            status = %result.status,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            timed_out = result.timed_out,
            "process finished"
        );

        self.finish(&mut result, hooks.as_deref(), log_id, live_log.as_deref())
            .await;

        ExecutionReport {
            result,
            error,
            mode: Some(mode),
        }
    }

    /// Demo mode: keep the hook bookkeeping, never spawn.
    async fn execute_demo(
        &self,
        request: ExecutionRequest,
        streams: Streams,
        hooks: Option<Arc<dyn Hooks>>,
        started_at: chrono::DateTime<Utc>,
    ) -> ExecutionReport {
        warn!(command = %request.command, "demo mode: command execution intercepted");
        streams.notice(DEMO_NOTICE);

        let log_id = match &hooks {
            Some(h) => match h.pre_execute(&request).await {
                Ok(id) => Some(id),
                Err(e) => {
                    debug!(error = %e, "pre-execute hook failed in demo mode");
                    None
                }
            },
            None => None,
        };

        let mut result = ExecutionResult::failed(&request.command, started_at, 0);
        result.output = DEMO_OUTPUT.to_string();
        result.log_id = log_id;

        if let (Some(h), Some(id)) = (&hooks, log_id) {
            if let Err(e) = h.post_execute(id, &result).await {
                debug!(error = %e, "post-execute hook failed in demo mode");
            }
        }

        ExecutionReport {
            result,
            error: None,
            mode: None,
        }
    }

    fn open_live_log(&self, id: LogId) -> Option<Arc<LiveLog>> {
        match self.registry.create(id) {
            Ok(log) => Some(log),
            Err(e) => {
                warn!(log_id = %id, error = %e, "could not open live log; output will not be captured");
                None
            }
        }
    }

    /// Pick a streaming mode and start the process.
    ///
    /// A PTY is tried first for merged output on non-Windows platforms; any
    /// PTY failure falls back to pipes silently.
    fn spawn(
        &self,
        spec: &ProcessSpec,
        streams: &Streams,
        capture: Option<&SharedSink>,
        combined: bool,
        log_id: Option<LogId>,
    ) -> anyhow::Result<(Running, StreamMode)> {
        if combined {
            let sink = with_capture(streams.stdout(), capture);

            if !cfg!(windows) {
                match pty::spawn(spec, Arc::clone(&sink), self.options.use_pty) {
                    Ok(p) => return Ok((Running::Pty(p), StreamMode::Pty)),
                    Err(e) => {
                        warn!(log_id = ?log_id, error = %e, "PTY start failed; falling back to pipe mode");
                    }
                }
            }

            let p = pipe::spawn_combined(spec, sink)?;
            return Ok((Running::Pipe(p), StreamMode::CombinedPipe));
        }

        debug!(log_id = ?log_id, "separate output streams requested; using pipe mode");
        let out = with_capture(streams.stdout(), capture);
        let err = with_capture(streams.stderr(), capture);
        let p = pipe::spawn_split(spec, out, err)?;
        Ok((Running::Pipe(p), StreamMode::SplitPipe))
    }

    /// Run `PostExecute` and release the live log.
    async fn finish(
        &self,
        result: &mut ExecutionResult,
        hooks: Option<&dyn Hooks>,
        log_id: Option<LogId>,
        live_log: Option<&LiveLog>,
    ) {
        if let (Some(h), Some(id)) = (hooks, log_id) {
            if let Err(e) = h.post_execute(id, result).await {
                warn!(log_id = %id, error = %e, "post-execute hook failed");
                result.append_output(&format!("[hook error] {e}"));
            }
        }

        if let Some(log) = live_log {
            if let Err(e) = log.close() {
                warn!(log_id = %log.id(), error = %e, "failed to close live log");
            }
        }
    }
}

/// Start the heartbeat routine. Returns a stop signal and its handle.
fn spawn_heartbeat(
    hooks: Arc<dyn Hooks>,
    log_id: LogId,
    interval: std::time::Duration,
) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let started = Instant::now();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(started + interval, interval);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let elapsed = started.elapsed().as_millis() as u64;
                    if let Err(e) = hooks.on_heartbeat(log_id, elapsed).await {
                        debug!(log_id = %log_id, error = %e, "heartbeat hook failed");
                    }
                }
            }
        }
    });

    (stop_tx, handle)
}
