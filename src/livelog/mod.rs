// src/livelog/mod.rs

//! Live log capture for running executions.
//!
//! - [`tiny_log`] holds [`LiveLog`], a file-backed output buffer that fans
//!   every write out to bounded subscriber channels.
//! - [`registry`] maps log IDs to live logs so a viewer can attach to an
//!   execution that is still running.
//! - [`codec`] contains the zlib+base64 codec used for persisted output and
//!   the text normalisation applied to raw process bytes.
//! - [`sink`] defines the [`OutputSink`] trait the executor writes into.
//!
//! Nothing in here knows about tasks, hooks or workflows.

pub mod codec;
pub mod registry;
pub mod sink;
pub mod tiny_log;

pub use codec::{compress_text, decompress_text, to_utf8};
pub use registry::{LogRegistry, LogRegistryOptions};
pub use sink::{DiscardSink, MemorySink, OutputSink, SharedSink, StdoutSink, TeeSink};
pub use tiny_log::{LiveLog, Subscription, SubscriptionId};

/// Default capacity of each subscriber channel.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Default size of the tail window scanned by `read_last_lines`.
pub const DEFAULT_TAIL_WINDOW_BYTES: u64 = 64 * 1024;
