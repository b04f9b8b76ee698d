// src/exec/streams.rs

//! Where the caller wants process output to go.

use std::sync::Arc;

use crate::livelog::sink::{OutputSink, SharedSink, TeeSink, same_sink};

/// Caller-side output targets for stdout and stderr.
///
/// `None` discards that stream. Passing the same sink for both (see
/// [`Streams::combined`]) asks for a single merged stream.
#[derive(Clone, Default)]
pub struct Streams {
    stdout: Option<SharedSink>,
    stderr: Option<SharedSink>,
}

impl std::fmt::Debug for Streams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Streams")
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("combined", &self.is_combined())
            .finish()
    }
}

impl Streams {
    /// Discard all output (the live log, if any, still captures it).
    pub fn discard() -> Self {
        Self::default()
    }

    /// Both streams into one sink.
    pub fn combined(sink: SharedSink) -> Self {
        Self {
            stdout: Some(Arc::clone(&sink)),
            stderr: Some(sink),
        }
    }

    /// Separate sinks for stdout and stderr.
    pub fn split(stdout: SharedSink, stderr: SharedSink) -> Self {
        Self {
            stdout: Some(stdout),
            stderr: Some(stderr),
        }
    }

    /// True when both streams go to the same place, or nowhere.
    pub fn is_combined(&self) -> bool {
        match (&self.stdout, &self.stderr) {
            (Some(a), Some(b)) => same_sink(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn stdout(&self) -> Option<&SharedSink> {
        self.stdout.as_ref()
    }

    pub fn stderr(&self) -> Option<&SharedSink> {
        self.stderr.as_ref()
    }

    /// Write a notice to stdout (used for the demo-mode banner).
    pub(crate) fn notice(&self, text: &str) {
        if let Some(out) = &self.stdout {
            let _ = out.write_chunk(text.as_bytes());
        }
    }
}

/// Combine a caller sink with an optional capture sink into one target.
pub(crate) fn with_capture(caller: Option<&SharedSink>, capture: Option<&SharedSink>) -> SharedSink {
    match (caller, capture) {
        (Some(a), Some(b)) => Arc::new(TeeSink::new(vec![Arc::clone(a), Arc::clone(b)])),
        (Some(a), None) => Arc::clone(a),
        (None, Some(b)) => Arc::clone(b),
        (None, None) => Arc::new(crate::livelog::DiscardSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::livelog::MemorySink;

    #[test]
    fn combined_detection() {
        let a: SharedSink = Arc::new(MemorySink::new());
        let b: SharedSink = Arc::new(MemorySink::new());
        assert!(Streams::discard().is_combined());
        assert!(Streams::combined(a.clone()).is_combined());
        assert!(!Streams::split(a, b).is_combined());
    }

    #[test]
    fn capture_is_teed_with_caller() {
        let caller = Arc::new(MemorySink::new());
        let capture = Arc::new(MemorySink::new());
        let caller_dyn: SharedSink = caller.clone();
        let capture_dyn: SharedSink = capture.clone();
        let target = with_capture(Some(&caller_dyn), Some(&capture_dyn));
        target.write_chunk(b"x").unwrap();
        assert_eq!(caller.text(), "x");
        assert_eq!(capture.text(), "x");
    }
}
