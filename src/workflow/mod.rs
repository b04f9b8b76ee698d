// src/workflow/mod.rs

//! Workflow trigger engine.
//!
//! - [`flow`]: the persisted graph payload.
//! - [`condition`]: edge condition normalization.
//! - [`graph`]: node index and root detection.
//! - [`plan`]: pure "what fires" evaluation.
//! - [`engine`]: the async shell that dispatches hops.
//! - [`control`]: control node kinds (delay, unknown).
//! - [`dispatch`]: bounded spawner and the completion channel.

pub mod condition;
pub mod control;
pub mod dispatch;
pub mod engine;
pub mod env;
pub mod flow;
pub mod graph;
pub mod invoker;
pub mod plan;

pub use condition::EdgeCondition;
pub use control::NodeKind;
pub use dispatch::{
    CompletionEvent, CompletionPublisher, DEFAULT_MAX_CONCURRENT_DISPATCHES, Dispatcher,
    completion_channel,
};
pub use engine::{DEFAULT_SETTLE_DELAY, EngineOptions, WorkflowEngine};
pub use env::{DEFAULT_ENV_PREFIX, EnvNames, RunId, WorkflowContext};
pub use flow::{FlowData, FlowEdge, FlowNode, parse_flow};
pub use invoker::{InvokeFuture, TaskInvoker};
