#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use taskdeck::exec::{Executor, ExecutorOptions};
use taskdeck::livelog::{LogRegistry, LogRegistryOptions};
use taskdeck::service::TaskService;
use taskdeck::store::{MemoryStore, SharedStore, TaskDef, Workflow};
use taskdeck::workflow::{
    Dispatcher, EngineOptions, EnvNames, TaskInvoker, WorkflowEngine, completion_channel,
};

/// Executor options tuned for tests: fast heartbeats, no PTY unless asked.
pub fn test_executor_options() -> ExecutorOptions {
    ExecutorOptions {
        heartbeat_interval: Duration::from_millis(50),
        use_pty: false,
        ..ExecutorOptions::default()
    }
}

pub fn test_executor(options: ExecutorOptions) -> Executor {
    Executor::new(LogRegistry::new(LogRegistryOptions::default()), options)
}

pub fn store_with(tasks: Vec<TaskDef>, workflows: Vec<Workflow>) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    for t in tasks {
        store.insert_task(t);
    }
    for w in workflows {
        store.insert_workflow(w);
    }
    Arc::new(store)
}

pub fn engine_options(settle_ms: u64) -> EngineOptions {
    EngineOptions {
        settle_delay: Duration::from_millis(settle_ms),
        ..EngineOptions::default()
    }
}

/// Engine over `store` dispatching into `invoker`.
pub fn engine_with(store: &Arc<MemoryStore>, invoker: Arc<dyn TaskInvoker>) -> Arc<WorkflowEngine> {
    let shared: SharedStore = store.clone();
    WorkflowEngine::new(shared, invoker, Dispatcher::new(8), engine_options(10))
        .expect("engine")
}

/// Real task service + engine wired through the completion channel.
pub fn live_panel(
    store: &Arc<MemoryStore>,
    options: ExecutorOptions,
) -> (Arc<TaskService>, Arc<WorkflowEngine>) {
    let shared: SharedStore = store.clone();
    let dispatcher = Dispatcher::new(8);
    let (publisher, rx) = completion_channel(&dispatcher, 64);
    let service = Arc::new(
        TaskService::new(
            test_executor(options),
            Arc::clone(&shared),
            EnvNames::new("PANEL").expect("names"),
        )
        .with_publisher(publisher),
    );
    let engine = WorkflowEngine::new(shared, service.clone(), dispatcher, engine_options(10))
        .expect("engine");
    tokio::spawn(Arc::clone(&engine).run_completions(rx));
    (service, engine)
}
