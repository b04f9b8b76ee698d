// src/livelog/tiny_log.rs

//! File-backed live log with real-time subscriber fan-out.

use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Weak;

use parking_lot::Mutex;
use tempfile::TempPath;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::errors::{PanelError, Result};
use crate::livelog::codec::{TextNormalizer, compress_reader};
use crate::livelog::registry::LogRegistry;
use crate::livelog::sink::OutputSink;
use crate::types::LogId;

/// Handle identifying one subscriber of a [`LiveLog`].
pub type SubscriptionId = u64;

/// Receiving end of a live log subscription.
///
/// The channel closes when the log closes or when the subscriber is removed
/// with [`LiveLog::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next chunk; `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Non-blocking receive, for draining in tests.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

type LogWriter = BufWriter<Box<dyn Write + Send>>;

struct LogState {
    writer: Option<LogWriter>,
    normalizer: TextNormalizer,
    subscribers: Vec<(SubscriptionId, mpsc::Sender<Vec<u8>>)>,
    next_subscription: SubscriptionId,
    closed: bool,
}

/// Output buffer for one execution.
///
/// Exactly one writer (the executor's copy routine) appends to a temporary
/// file; any number of viewers subscribe for live chunks. The subscriber
/// list and closed flag live behind this log's own lock, separate from the
/// registry lock.
pub struct LiveLog {
    id: LogId,
    path: PathBuf,
    subscriber_capacity: usize,
    tail_window_bytes: u64,
    state: Mutex<LogState>,
    /// Owns the backing file on disk; dropping it deletes the file.
    temp: Mutex<Option<TempPath>>,
    registry: Weak<LogRegistry>,
}

impl std::fmt::Debug for LiveLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveLog")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl LiveLog {
    /// Open a fresh temporary backing file. Registration is done by
    /// [`LogRegistry::create`].
    pub(crate) fn open(
        id: LogId,
        subscriber_capacity: usize,
        tail_window_bytes: u64,
        registry: Weak<LogRegistry>,
    ) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("task_log_")
            .suffix(".log")
            .tempfile()?;
        let (file, temp_path) = temp.into_parts();
        let path = temp_path.to_path_buf();

        debug!(log_id = %id, path = ?path, "opened live log");

        Ok(Self {
            id,
            path,
            subscriber_capacity: subscriber_capacity.max(1),
            tail_window_bytes,
            state: Mutex::new(LogState {
                writer: Some(BufWriter::new(Box::new(file))),
                normalizer: TextNormalizer::new(),
                subscribers: Vec::new(),
                next_subscription: 0,
                closed: false,
            }),
            temp: Mutex::new(Some(temp_path)),
            registry,
        })
    }

    pub fn id(&self) -> LogId {
        self.id
    }

    /// Path of the backing temporary file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Append a chunk and broadcast it to subscribers.
    ///
    /// Never blocks on subscribers: a full channel drops the chunk for that
    /// subscriber only. Returns the number of input bytes consumed.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PanelError::LogClosed(self.id));
        }

        let text = state.normalizer.push(data);
        if text.is_empty() {
            return Ok(data.len());
        }

        match state.writer.as_mut() {
            Some(writer) => writer.write_all(&text)?,
            None => return Err(PanelError::LogClosed(self.id)),
        }

        let log_id = self.id;
        state.subscribers.retain(|(sub_id, tx)| match tx.try_send(text.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(log_id = %log_id, subscription = sub_id, "subscriber lagging; dropped chunk");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });

        Ok(data.len())
    }

    /// Register a new subscriber for future writes.
    pub fn subscribe(&self) -> Subscription {
        let mut state = self.state.lock();
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        let id = state.next_subscription;
        state.next_subscription += 1;

        // A closed log hands out an already-closed channel.
        if !state.closed {
            state.subscribers.push((id, tx));
        }

        Subscription { id, rx }
    }

    /// Remove a subscriber and close its channel. Unknown IDs are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut state = self.state.lock();
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Flush, close every subscriber, unregister and close the file.
    ///
    /// Idempotent. The log ends up closed and unregistered even when the
    /// final flush fails; that error is returned afterwards.
    pub fn close(&self) -> Result<()> {
        let flushed = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.subscribers.clear();

            let rest = state.normalizer.finish();
            match state.writer.take() {
                Some(mut writer) => writer.write_all(&rest).and_then(|()| writer.flush()),
                None => Ok(()),
            }
        };

        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }

        if let Err(e) = flushed {
            warn!(log_id = %self.id, error = %e, "live log closed with a failed flush");
            return Err(e.into());
        }
        debug!(log_id = %self.id, "closed live log");
        Ok(())
    }

    /// Close the log, compress the backing file and delete it.
    ///
    /// Returns the base64(zlib) payload for persistence. Must not race with
    /// further writes.
    pub fn compress_and_cleanup(&self) -> Result<String> {
        if let Err(e) = self.close() {
            warn!(log_id = %self.id, error = %e, "failed to close live log before compression");
        }

        let temp = self
            .temp
            .lock()
            .take()
            .ok_or(PanelError::LogNotFound(self.id))?;

        let encoded = File::open(&temp).and_then(compress_reader);

        if let Err(e) = temp.close() {
            warn!(log_id = %self.id, error = %e, "failed to remove live log file");
        }

        Ok(encoded?)
    }

    /// Best-effort preview of the last `n` lines.
    ///
    /// Only the trailing window (64KB by default) is scanned, so fewer than
    /// `n` lines may come back for very long lines. An unterminated last
    /// line comes back in addition to the last `n` complete ones.
    pub fn read_last_lines(&self, n: usize) -> Result<Vec<u8>> {
        let mut state = self.state.lock();
        if let Some(writer) = state.writer.as_mut() {
            if let Err(e) = writer.flush() {
                debug!(log_id = %self.id, error = %e, "flush before tail read failed");
            }
        }

        let path = self
            .temp
            .lock()
            .as_ref()
            .map(|t| t.to_path_buf())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "live log file already removed")
            })?;

        let mut file = File::open(&path)?;
        let size = file.metadata()?.len();
        let limit = size.min(self.tail_window_bytes);
        file.seek(SeekFrom::Start(size - limit))?;

        let mut data = Vec::with_capacity(limit as usize);
        file.take(limit).read_to_end(&mut data)?;
        drop(state);

        let lines: Vec<&[u8]> = data.split(|b| *b == b'\n').collect();
        if lines.len() > n + 1 {
            return Ok(lines[lines.len() - n - 1..].join(&b'\n'));
        }
        Ok(data)
    }
}

impl OutputSink for LiveLog {
    fn write_chunk(&self, data: &[u8]) -> Result<()> {
        self.write(data).map(|_| ())
    }
}
