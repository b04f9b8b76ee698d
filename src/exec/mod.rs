// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`executor`] owns [`Executor::execute`]: timeout, environment setup,
//!   streaming-mode selection and the hook protocol.
//! - [`hooks`] defines the [`Hooks`] trait implemented by persistence.
//! - [`pty`] and [`pipe`] are the two streaming backends; [`process`] holds
//!   what they share.
//! - [`request`] has the request/result types, [`streams`] the caller-side
//!   output targets, and [`version_manager`] the `mise exec` rewrite.

pub mod executor;
pub mod hooks;
pub mod pipe;
pub mod process;
pub mod pty;
pub mod request;
pub mod streams;
pub mod version_manager;

pub use executor::{DEMO_OUTPUT, ExecutionReport, Executor, StreamMode};
pub use hooks::{HookFuture, Hooks};
pub use request::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_TIMEOUT_MINUTES, ExecutionRequest, ExecutionResult,
    ExecutorOptions, LanguageSpec, MAX_TIMEOUT_MINUTES, timeout_from_minutes,
};
pub use streams::Streams;
