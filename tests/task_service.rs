// tests/task_service.rs
#![cfg(unix)]

mod common;

use std::time::Duration;

use taskdeck::errors::PanelError;
use taskdeck::livelog::{MemorySink, decompress_text};
use taskdeck::service::follow::END_MARKER;
use taskdeck::service::{FollowOutcome, follow_log};
use taskdeck::store::CompletionRecord;
use taskdeck::types::{ExecStatus, LogId};
use taskdeck_test_utils::builders::{FlowBuilder, TaskDefBuilder, workflow};
use taskdeck_test_utils::{init_tracing, with_timeout};

use common::{live_panel, store_with, test_executor_options};

fn output_of(record: &CompletionRecord) -> String {
    decompress_text(&record.output).expect("stored output decodes")
}

#[tokio::test]
async fn run_persists_record_and_stats() {
    init_tracing();
    let store = store_with(
        vec![TaskDefBuilder::new(1, "echo hello; echo \"$GREETING\"")
            .env("GREETING", "from task")
            .build()],
        vec![],
    );
    let (service, engine) = live_panel(&store, test_executor_options());

    let report = with_timeout(service.run_task(1, vec![])).await.unwrap();
    with_timeout(engine.wait_idle()).await;

    assert_eq!(report.result.status, ExecStatus::Success);
    let log_id = report.result.log_id.expect("log id minted by hooks");

    let records = store.records_for_task(1);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.log_id, log_id);
    assert_eq!(record.status, ExecStatus::Success);
    assert_eq!(record.exit_code, 0);
    assert!(record.finished_at.is_some());
    assert_eq!(output_of(record), "hello\nfrom task\n");
    assert_eq!(store.stats(1).success, 1);

    // The live log is gone once the record is final.
    assert!(service.executor().registry().get(log_id).is_none());
}

#[tokio::test]
async fn failed_run_records_exit_code_and_error() {
    let store = store_with(vec![TaskDefBuilder::new(7, "echo oops >&2; exit 3").build()], vec![]);
    let (service, engine) = live_panel(&store, test_executor_options());

    let report = with_timeout(service.run_task(7, vec![])).await.unwrap();
    with_timeout(engine.wait_idle()).await;

    assert!(matches!(report.error, Some(PanelError::NonZeroExit(3))));
    let record = &store.records_for_task(7)[0];
    assert_eq!(record.status, ExecStatus::Failed);
    assert_eq!(record.exit_code, 3);
    assert!(record.error.is_some());
    let text = output_of(record);
    assert!(text.contains("oops"), "{text}");
    assert!(text.contains("[ERROR]"), "{text}");
    assert_eq!(store.stats(7).failed, 1);
}

#[tokio::test]
async fn unknown_task_is_reported_not_run() {
    let store = store_with(vec![], vec![]);
    let (service, _engine) = live_panel(&store, test_executor_options());

    let err = service.run_task(42, vec![]).await.unwrap_err();
    assert!(matches!(err, PanelError::TaskNotFound(42)));
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn completion_drives_downstream_task_with_captured_output() {
    init_tracing();
    let flow = FlowBuilder::new()
        .node("A", 1)
        .node("B", 2)
        .node("C", 3)
        .edge("A", "B", "success")
        .edge("A", "C", "error")
        .build();
    let store = store_with(
        vec![
            TaskDefBuilder::new(1, "echo building; echo PANEL_OUT_TAG=v1").build(),
            TaskDefBuilder::new(2, "echo \"tag=$PANEL_TAG run=$PANEL_WF_RUN_ID\"").build(),
            TaskDefBuilder::new(3, "echo rollback").build(),
        ],
        vec![workflow("release", &flow)],
    );
    let (service, engine) = live_panel(&store, test_executor_options());

    with_timeout(service.run_task(1, vec![])).await.unwrap();
    with_timeout(engine.wait_idle()).await;

    assert!(store.records_for_task(3).is_empty());

    let downstream = store.records_for_task(2);
    assert_eq!(downstream.len(), 1);
    let record = &downstream[0];
    assert_eq!(record.status, ExecStatus::Success);
    assert_eq!(record.workflow_id.as_deref(), Some("release"));
    let run_id = record.workflow_run_id.clone().expect("run id recorded");
    assert!(run_id.starts_with("WF-RUN-"));
    assert_eq!(output_of(record), format!("tag=v1 run={run_id}\n"));

    // Direct invocation belongs to no run.
    assert_eq!(store.records_for_task(1)[0].workflow_run_id, None);
}

#[tokio::test]
async fn manual_trigger_runs_the_whole_chain_under_one_run() {
    let flow = FlowBuilder::new()
        .node("A", 1)
        .node("B", 2)
        .edge("A", "B", "")
        .build();
    let store = store_with(
        vec![
            TaskDefBuilder::new(1, "echo \"$PANEL_WF_TRIGGER\"").build(),
            TaskDefBuilder::new(2, "echo two").build(),
        ],
        vec![workflow("chain", &flow)],
    );
    let (_service, engine) = live_panel(&store, test_executor_options());

    let run_id = engine.trigger_workflow("chain", vec![]).unwrap();
    with_timeout(engine.wait_idle()).await;

    let first = &store.records_for_task(1)[0];
    let second = &store.records_for_task(2)[0];
    assert_eq!(output_of(first), "manual\n");
    assert_eq!(first.workflow_run_id.as_deref(), Some(run_id.as_str()));
    assert_eq!(second.workflow_run_id.as_deref(), Some(run_id.as_str()));
}

#[tokio::test]
async fn history_and_running_count() {
    let store = store_with(
        vec![
            TaskDefBuilder::new(1, "echo one").build(),
            TaskDefBuilder::new(2, "sleep 0.3").build(),
        ],
        vec![],
    );
    let (service, _engine) = live_panel(&store, test_executor_options());

    let slow = {
        let service = service.clone();
        tokio::spawn(async move { service.run_task(2, vec![]).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(service.running_count(), 1);

    service.run_task(1, vec![]).await.unwrap();
    with_timeout(slow).await.unwrap().unwrap();
    assert_eq!(service.running_count(), 0);

    let history: Vec<_> = service.last_results(10).iter().map(|r| r.task_id).collect();
    assert_eq!(history, vec![2, 1]);
    assert_eq!(service.last_results(1).len(), 1);
}

#[tokio::test]
async fn follow_serves_stored_output_for_finished_runs() {
    let store = store_with(vec![TaskDefBuilder::new(1, "echo done").build()], vec![]);
    let (service, _engine) = live_panel(&store, test_executor_options());
    let report = service.run_task(1, vec![]).await.unwrap();

    let viewer = MemorySink::new();
    let outcome = follow_log(
        store.as_ref(),
        service.executor().registry(),
        report.result.log_id.unwrap(),
        &viewer,
    )
    .await
    .unwrap();

    assert_eq!(outcome, FollowOutcome::Stored);
    assert_eq!(viewer.text(), "done\n");
}

#[tokio::test]
async fn follow_reports_unknown_logs() {
    let store = store_with(vec![], vec![]);
    let (service, _engine) = live_panel(&store, test_executor_options());

    let viewer = MemorySink::new();
    let outcome = follow_log(store.as_ref(), service.executor().registry(), LogId(999), &viewer)
        .await
        .unwrap();

    assert_eq!(outcome, FollowOutcome::NotRunning);
    assert!(!viewer.text().is_empty());
}

#[tokio::test]
async fn follow_streams_a_running_execution_to_the_end() {
    init_tracing();
    let store = store_with(
        vec![TaskDefBuilder::new(1, "echo first; sleep 0.5; echo second").build()],
        vec![],
    );
    let (service, _engine) = live_panel(&store, test_executor_options());

    let run = {
        let service = service.clone();
        tokio::spawn(async move { service.run_task(1, vec![]).await })
    };

    let log_id = with_timeout(async {
        loop {
            if let Some(r) = store
                .records_for_task(1)
                .into_iter()
                .find(|r| r.status == ExecStatus::Running)
            {
                break r.log_id;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    // Let the first line land in the live log.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let viewer = MemorySink::new();
    let outcome = with_timeout(follow_log(
        store.as_ref(),
        service.executor().registry(),
        log_id,
        &viewer,
    ))
    .await
    .unwrap();

    assert_eq!(outcome, FollowOutcome::Live);
    let text = viewer.text();
    assert!(text.starts_with("[system] attached"), "{text}");
    assert!(text.contains("first"), "{text}");
    assert!(text.contains("second"), "{text}");
    assert!(text.ends_with(END_MARKER), "{text}");

    with_timeout(run).await.unwrap().unwrap();
}
