// src/livelog/registry.rs

//! Registry of live logs keyed by log ID.
//!
//! One registry is constructed at startup and shared (via `Arc`) with
//! whatever creates executions and whatever serves live viewers. Tests build
//! their own isolated registries.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::RwLock;
use tracing::debug;

use crate::errors::Result;
use crate::livelog::tiny_log::LiveLog;
use crate::livelog::{DEFAULT_SUBSCRIBER_CAPACITY, DEFAULT_TAIL_WINDOW_BYTES};
use crate::types::LogId;

/// Knobs applied to every log the registry creates.
#[derive(Debug, Clone, Copy)]
pub struct LogRegistryOptions {
    /// Capacity of each subscriber channel.
    pub subscriber_capacity: usize,
    /// Maximum bytes scanned by `read_last_lines`.
    pub tail_window_bytes: u64,
}

impl Default for LogRegistryOptions {
    fn default() -> Self {
        Self {
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            tail_window_bytes: DEFAULT_TAIL_WINDOW_BYTES,
        }
    }
}

#[derive(Debug, Default)]
pub struct LogRegistry {
    logs: RwLock<HashMap<LogId, Arc<LiveLog>>>,
    options: LogRegistryOptions,
}

impl LogRegistry {
    pub fn new(options: LogRegistryOptions) -> Arc<Self> {
        Arc::new(Self {
            logs: RwLock::new(HashMap::new()),
            options,
        })
    }

    /// Open a new live log and register it under `id`.
    ///
    /// Fails if a log with the same ID is still registered.
    pub fn create(self: &Arc<Self>, id: LogId) -> Result<Arc<LiveLog>> {
        if self.logs.read().contains_key(&id) {
            return Err(anyhow!("live log {id} is already registered").into());
        }

        let log = Arc::new(LiveLog::open(
            id,
            self.options.subscriber_capacity,
            self.options.tail_window_bytes,
            Arc::downgrade(self),
        )?);

        let mut logs = self.logs.write();
        if logs.contains_key(&id) {
            return Err(anyhow!("live log {id} is already registered").into());
        }
        logs.insert(id, Arc::clone(&log));
        debug!(log_id = %id, active = logs.len(), "registered live log");

        Ok(log)
    }

    /// Look up a still-running log. `None` once it has closed.
    pub fn get(&self, id: LogId) -> Option<Arc<LiveLog>> {
        self.logs.read().get(&id).cloned()
    }

    pub(crate) fn unregister(&self, id: LogId) {
        if self.logs.write().remove(&id).is_some() {
            debug!(log_id = %id, "unregistered live log");
        }
    }

    pub fn len(&self) -> usize {
        self.logs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.read().is_empty()
    }
}
