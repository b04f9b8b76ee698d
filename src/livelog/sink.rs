// src/livelog/sink.rs

//! Output sinks the executor streams process output into.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::Result;

/// Something process output can be written to.
///
/// Implementations must be cheap to call from a blocking reader thread and
/// must never block on slow consumers.
pub trait OutputSink: Send + Sync {
    fn write_chunk(&self, data: &[u8]) -> Result<()>;
}

/// Shared handle to a sink. Two handles pointing at the same allocation are
/// treated as "the same stream" by the executor.
pub type SharedSink = Arc<dyn OutputSink>;

/// Whether two sink handles refer to the same underlying sink.
pub fn same_sink(a: &SharedSink, b: &SharedSink) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Swallows everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl OutputSink for DiscardSink {
    fn write_chunk(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Collects output in memory. Mostly useful for tests and short commands.
#[derive(Debug, Default)]
pub struct MemorySink {
    buf: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.buf.lock().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

impl OutputSink for MemorySink {
    fn write_chunk(&self, data: &[u8]) -> Result<()> {
        self.buf.lock().extend_from_slice(data);
        Ok(())
    }
}

/// Writes straight to the process STDOUT.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_chunk(&self, data: &[u8]) -> Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(data)?;
        out.flush()?;
        Ok(())
    }
}

/// Fans one write out to several sinks, in order. The first error wins but
/// every sink still sees the chunk.
pub struct TeeSink {
    sinks: Vec<SharedSink>,
}

impl TeeSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }
}

impl OutputSink for TeeSink {
    fn write_chunk(&self, data: &[u8]) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.write_chunk(data) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tee_writes_to_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let tee = TeeSink::new(vec![a.clone(), b.clone()]);
        tee.write_chunk(b"hi").unwrap();
        assert_eq!(a.text(), "hi");
        assert_eq!(b.text(), "hi");
    }

    #[test]
    fn same_sink_compares_allocations() {
        let a: SharedSink = Arc::new(MemorySink::new());
        let b: SharedSink = Arc::new(MemorySink::new());
        assert!(same_sink(&a, &a.clone()));
        assert!(!same_sink(&a, &b));
    }
}
