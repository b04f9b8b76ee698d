// tests/executor_hooks.rs
#![cfg(unix)]

mod common;

use std::sync::{Arc, Mutex};

use taskdeck::errors::{PanelError, Result};
use taskdeck::exec::{
    DEMO_OUTPUT, ExecutionRequest, ExecutionResult, ExecutorOptions, HookFuture, Hooks,
    LanguageSpec, Streams,
};
use taskdeck::livelog::{LogRegistry, MemorySink, SharedSink};
use taskdeck::types::{ExecStatus, LogId};
use taskdeck_test_utils::{init_tracing, with_timeout};

use common::test_executor_options;

/// Hooks that record every call and can be told to fail.
#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
    commands: Mutex<Vec<String>>,
    results: Mutex<Vec<ExecutionResult>>,
    fail_pre: bool,
    fail_post: bool,
    registry: Option<Arc<LogRegistry>>,
    live_log_open_in_post: Mutex<Option<bool>>,
}

impl RecordingHooks {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Hooks for RecordingHooks {
    fn pre_execute<'a>(&'a self, request: &'a ExecutionRequest) -> HookFuture<'a, LogId> {
        Box::pin(async move {
            self.events.lock().unwrap().push("pre".into());
            self.commands.lock().unwrap().push(request.command.clone());
            if self.fail_pre {
                return Err(PanelError::Hook("store unavailable".into()));
            }
            Ok(LogId(77))
        })
    }

    fn on_heartbeat(&self, log_id: LogId, _elapsed_ms: u64) -> HookFuture<'_, ()> {
        Box::pin(async move {
            assert_eq!(log_id, LogId(77));
            self.events.lock().unwrap().push("heartbeat".into());
            Ok(())
        })
    }

    fn post_execute<'a>(&'a self, log_id: LogId, result: &'a ExecutionResult) -> HookFuture<'a, ()> {
        Box::pin(async move {
            assert_eq!(log_id, LogId(77));
            self.events.lock().unwrap().push("post".into());
            self.results.lock().unwrap().push(result.clone());
            if let Some(registry) = &self.registry {
                *self.live_log_open_in_post.lock().unwrap() = Some(registry.get(log_id).is_some());
            }
            let outcome: Result<()> = if self.fail_post {
                Err(PanelError::Hook("disk full".into()))
            } else {
                Ok(())
            };
            outcome
        })
    }
}

fn executor_with(options: ExecutorOptions) -> (taskdeck::exec::Executor, Arc<LogRegistry>) {
    let registry = LogRegistry::new(Default::default());
    (
        taskdeck::exec::Executor::new(Arc::clone(&registry), options),
        registry,
    )
}

#[tokio::test]
async fn hooks_run_in_order_with_heartbeats_in_between() {
    init_tracing();
    let (executor, registry) = executor_with(test_executor_options());
    let hooks = Arc::new(RecordingHooks {
        registry: Some(Arc::clone(&registry)),
        ..Default::default()
    });

    let report = with_timeout(executor.execute(
        ExecutionRequest::new("sleep 0.4; echo done"),
        Streams::discard(),
        Some(hooks.clone() as Arc<dyn Hooks>),
    ))
    .await;

    assert!(report.result.is_success());
    assert_eq!(report.result.log_id, Some(LogId(77)));

    let events = hooks.events();
    assert_eq!(events.first().map(String::as_str), Some("pre"));
    assert_eq!(events.last().map(String::as_str), Some("post"));
    assert_eq!(events.iter().filter(|e| *e == "post").count(), 1);
    assert!(events.iter().any(|e| e == "heartbeat"), "events: {events:?}");

    // The live log is still attachable during post-execute and gone after.
    assert_eq!(*hooks.live_log_open_in_post.lock().unwrap(), Some(true));
    assert!(registry.get(LogId(77)).is_none());
}

#[tokio::test]
async fn live_log_receives_process_output() {
    let (executor, registry) = executor_with(test_executor_options());
    let hooks: Arc<dyn Hooks> = Arc::new(RecordingHooks::default());

    let exec = executor.clone();
    let handle = tokio::spawn(async move {
        exec.execute(
            ExecutionRequest::new("sleep 0.3; echo captured-line; sleep 0.3"),
            Streams::discard(),
            Some(hooks),
        )
        .await
    });

    let log = with_timeout(async {
        loop {
            if let Some(log) = registry.get(LogId(77)) {
                return log;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await;

    let mut sub = log.subscribe();
    let mut seen = String::new();
    while let Some(chunk) = with_timeout(sub.recv()).await {
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(seen.contains("captured-line"), "seen: {seen:?}");

    let report = handle.await.unwrap();
    assert!(report.result.is_success());
}

#[tokio::test]
async fn pre_execute_failure_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let (executor, _) = executor_with(test_executor_options());
    let hooks = Arc::new(RecordingHooks {
        fail_pre: true,
        ..Default::default()
    });

    let report = executor
        .execute(
            ExecutionRequest::new(format!("touch {}", marker.display())),
            Streams::discard(),
            Some(hooks.clone() as Arc<dyn Hooks>),
        )
        .await;

    assert_eq!(report.result.status, ExecStatus::Failed);
    assert!(matches!(report.error, Some(PanelError::Hook(_))));
    assert!(report.mode.is_none());
    assert_eq!(hooks.events(), vec!["pre".to_string()]);
    assert!(!marker.exists());
}

#[tokio::test]
async fn post_execute_failure_never_changes_the_status() {
    let (executor, _) = executor_with(test_executor_options());
    let hooks = Arc::new(RecordingHooks {
        fail_post: true,
        ..Default::default()
    });

    let report = with_timeout(executor.execute(
        ExecutionRequest::new("true"),
        Streams::discard(),
        Some(hooks.clone() as Arc<dyn Hooks>),
    ))
    .await;

    assert_eq!(report.result.status, ExecStatus::Success);
    assert!(report.error.is_none());
    assert!(report.result.output.contains("[hook error]"));
}

#[tokio::test]
async fn spawn_failure_still_calls_post_execute_once() {
    let (executor, registry) = executor_with(test_executor_options());
    let hooks = Arc::new(RecordingHooks::default());
    let mut request = ExecutionRequest::new("echo never");
    request.work_dir = Some("/definitely/not/a/dir".into());

    let report = executor
        .execute(request, Streams::discard(), Some(hooks.clone() as Arc<dyn Hooks>))
        .await;

    assert!(matches!(report.error, Some(PanelError::Spawn(_))));
    assert_eq!(hooks.events(), vec!["pre".to_string(), "post".to_string()]);
    assert!(report.result.output.contains("[system error]"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn timeout_still_calls_post_execute_once() {
    let (executor, _) = executor_with(test_executor_options());
    let hooks = Arc::new(RecordingHooks::default());
    let mut request = ExecutionRequest::new("sleep 5");
    request.timeout_override = Some(std::time::Duration::from_millis(200));

    let report = with_timeout(executor.execute(
        request,
        Streams::discard(),
        Some(hooks.clone() as Arc<dyn Hooks>),
    ))
    .await;

    assert!(report.result.timed_out);
    let posted = hooks.results.lock().unwrap().clone();
    assert_eq!(posted.len(), 1);
    assert!(posted[0].timed_out);
}

#[tokio::test]
async fn demo_mode_keeps_bookkeeping_but_never_spawns() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let (executor, _) = executor_with(ExecutorOptions {
        demo_mode: true,
        ..test_executor_options()
    });
    let hooks = Arc::new(RecordingHooks::default());
    let sink = Arc::new(MemorySink::new());
    let shared: SharedSink = sink.clone();

    let report = executor
        .execute(
            ExecutionRequest::new(format!("touch {}", marker.display())),
            Streams::combined(shared),
            Some(hooks.clone() as Arc<dyn Hooks>),
        )
        .await;

    assert_eq!(report.result.status, ExecStatus::Failed);
    assert_eq!(report.result.output, DEMO_OUTPUT);
    assert!(report.mode.is_none());
    assert_eq!(hooks.events(), vec!["pre".to_string(), "post".to_string()]);
    assert!(sink.text().contains("[demo mode]"));
    assert!(!marker.exists());
}

#[tokio::test]
async fn version_manager_rewrite_is_what_pre_execute_records() {
    let (executor, _) = executor_with(ExecutorOptions {
        demo_mode: true,
        ..test_executor_options()
    });
    let hooks = Arc::new(RecordingHooks::default());

    let mut request = ExecutionRequest::new("node app.js");
    request.use_version_manager = true;
    request.languages = vec![
        LanguageSpec::new("node", Some("20")),
        LanguageSpec::new("python", None),
    ];

    let report = executor
        .execute(request, Streams::discard(), Some(hooks.clone() as Arc<dyn Hooks>))
        .await;

    let expected = "mise exec node@20 python@latest -- node app.js";
    assert_eq!(hooks.commands.lock().unwrap().as_slice(), [expected.to_string()]);
    assert_eq!(report.result.command, expected);
}
