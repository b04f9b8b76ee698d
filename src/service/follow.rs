// src/service/follow.rs

//! Live log follower: what a log viewer connection runs.
//!
//! Finished executions are served from the persisted record; running ones
//! attach to the live log. A viewer going away only stops its own
//! forwarding.

use tracing::debug;

use crate::errors::Result;
use crate::livelog::{LogRegistry, OutputSink, decompress_text};
use crate::store::CompletionStore;
use crate::types::{ExecStatus, LogId};

/// Lines replayed from the tail of a live log on attach.
pub const FOLLOW_TAIL_LINES: usize = 100;

pub const NOT_RUNNING_MESSAGE: &str = "no running log found for this execution";
pub const END_MARKER: &str = "\n--- execution finished ---\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    /// Served the persisted output of a finished execution.
    Stored,
    /// Followed a live log until it closed.
    Live,
    /// Followed a live log until the viewer stopped accepting output.
    Detached,
    /// Neither a finished record nor a live log exists.
    NotRunning,
}

pub async fn follow_log(
    store: &dyn CompletionStore,
    registry: &LogRegistry,
    log_id: LogId,
    viewer: &dyn OutputSink,
) -> Result<FollowOutcome> {
    if let Some(record) = store.get_record(log_id) {
        if record.status != ExecStatus::Running {
            let content = decompress_text(&record.output)?;
            viewer.write_chunk(content.as_bytes())?;
            return Ok(FollowOutcome::Stored);
        }
    }

    let Some(log) = registry.get(log_id) else {
        viewer.write_chunk(NOT_RUNNING_MESSAGE.as_bytes())?;
        return Ok(FollowOutcome::NotRunning);
    };

    let banner = format!("[system] attached, following live output (log {log_id})\n");
    viewer.write_chunk(banner.as_bytes())?;

    if let Ok(tail) = log.read_last_lines(FOLLOW_TAIL_LINES) {
        if !tail.is_empty() {
            viewer.write_chunk(&tail)?;
        }
    }

    let mut sub = log.subscribe();
    while let Some(chunk) = sub.recv().await {
        if let Err(e) = viewer.write_chunk(&chunk) {
            debug!(log_id = %log_id, error = %e, "viewer went away; detaching");
            log.unsubscribe(sub.id());
            return Ok(FollowOutcome::Detached);
        }
    }

    viewer.write_chunk(END_MARKER.as_bytes())?;
    Ok(FollowOutcome::Live)
}
