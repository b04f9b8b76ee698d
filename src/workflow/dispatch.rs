// src/workflow/dispatch.rs

//! Bounded fan-out and completion delivery.
//!
//! Every downstream hop runs as a tokio task submitted to a [`Dispatcher`],
//! which caps concurrency with a semaphore and counts in-flight work so
//! callers can wait for a run to go quiet. Completions travel from the
//! persistence hooks to the engine over a channel; each queued completion
//! also counts as in-flight until the engine has planned its hops.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use tokio::sync::{Notify, Semaphore, mpsc};
use tracing::debug;

use crate::errors::{PanelError, Result};
use crate::store::CompletionRecord;

pub const DEFAULT_MAX_CONCURRENT_DISPATCHES: usize = 16;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

/// Keeps the dispatcher busy while alive.
#[derive(Debug)]
pub struct IdleGuard {
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for IdleGuard {
    fn drop(&mut self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_DISPATCHES)
    }
}

impl Dispatcher {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Mark one unit of work as in flight until the guard drops.
    pub fn hold(&self) -> IdleGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        IdleGuard {
            in_flight: Arc::clone(&self.in_flight),
            idle: Arc::clone(&self.idle),
        }
    }

    /// Run `job` on its own task once a permit is free.
    ///
    /// Returns immediately; sibling jobs have no ordering guarantee.
    pub fn spawn<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.hold();
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let _guard = guard;
            let Ok(_permit) = permits.acquire_owned().await else {
                debug!("dispatcher closed; dropping job");
                return;
            };
            job.await;
        });
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no job or queued completion is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// A completion on its way to the engine.
#[derive(Debug)]
pub struct CompletionEvent {
    pub record: CompletionRecord,
    _hold: IdleGuard,
}

/// Sending half of the completion channel, held by the persistence hooks.
#[derive(Debug, Clone)]
pub struct CompletionPublisher {
    tx: mpsc::Sender<CompletionEvent>,
    dispatcher: Dispatcher,
}

impl CompletionPublisher {
    pub async fn publish(&self, record: CompletionRecord) -> Result<()> {
        let event = CompletionEvent {
            record,
            _hold: self.dispatcher.hold(),
        };
        self.tx.send(event).await.map_err(|_| {
            PanelError::Other(anyhow!("workflow engine is no longer receiving completions"))
        })
    }
}

pub fn completion_channel(
    dispatcher: &Dispatcher,
    capacity: usize,
) -> (CompletionPublisher, mpsc::Receiver<CompletionEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        CompletionPublisher {
            tx,
            dispatcher: dispatcher.clone(),
        },
        rx,
    )
}
