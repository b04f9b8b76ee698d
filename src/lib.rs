// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod livelog;
pub mod logging;
pub mod service;
pub mod store;
pub mod types;
pub mod workflow;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{PanelFile, config_base_dir, load_and_validate, resolve_workflows};
use crate::exec::{Executor, Streams};
use crate::livelog::{LogRegistry, StdoutSink};
use crate::service::TaskService;
use crate::store::{MemoryStore, SharedStore};
use crate::workflow::{Dispatcher, EnvNames, WorkflowEngine, completion_channel};

/// Capacity of the completion channel between the hooks and the engine.
const COMPLETION_CHANNEL_CAPACITY: usize = 256;

/// Everything wired together for one panel.
#[derive(Debug)]
pub struct Panel {
    pub store: Arc<MemoryStore>,
    pub service: Arc<TaskService>,
    pub engine: Arc<WorkflowEngine>,
}

impl Panel {
    /// Build the registry, executor, task service and workflow engine, and
    /// start the engine's completion loop. Must be called inside a runtime.
    pub fn build(cfg: &PanelFile, base_dir: &Path, streams: Streams) -> crate::errors::Result<Self> {
        let store = Arc::new(MemoryStore::from_panel(cfg, base_dir)?);
        let shared: SharedStore = store.clone();

        let registry = LogRegistry::new(cfg.engine.registry_options());
        let executor = Executor::new(registry, cfg.engine.executor_options());

        let dispatcher = Dispatcher::new(cfg.engine.max_concurrent_dispatches);
        let (publisher, completions) =
            completion_channel(&dispatcher, COMPLETION_CHANNEL_CAPACITY);

        let engine_options = cfg.engine.engine_options();
        let service = Arc::new(
            TaskService::new(
                executor,
                Arc::clone(&shared),
                EnvNames::new(&engine_options.env_prefix)?,
            )
            .with_publisher(publisher)
            .with_streams(streams),
        );

        let engine = WorkflowEngine::new(shared, service.clone(), dispatcher, engine_options)?;
        tokio::spawn(Arc::clone(&engine).run_completions(completions));

        Ok(Self {
            store,
            service,
            engine,
        })
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - panel file loading
/// - executor, task service and workflow engine
/// - the requested trigger (`--workflow` or `--task`)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone();
    let mut cfg = load_and_validate(&config_path)?;
    let base_dir = config_base_dir(&config_path);

    if args.demo {
        cfg.engine.demo_mode = true;
    }

    if args.dry_run {
        print_dry_run(&cfg, &base_dir)?;
        return Ok(());
    }

    if args.workflow.is_none() && args.task.is_none() {
        bail!("nothing to run: pass --workflow <ID> or --task <ID> (or --dry-run)");
    }

    let panel = Panel::build(&cfg, &base_dir, Streams::combined(Arc::new(StdoutSink)))?;

    let failed = tokio::select! {
        res = drive(&panel, &args) => res?,
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            info!("interrupted; stopping");
            return Ok(());
        }
    };

    print_summary(&panel);

    if failed {
        bail!("run finished with failures");
    }
    Ok(())
}

/// Start the requested run and wait until nothing is in flight. Returns
/// whether the directly requested task failed.
async fn drive(panel: &Panel, args: &CliArgs) -> Result<bool> {
    if let Some(workflow) = &args.workflow {
        let run_id = panel.engine.trigger_workflow(workflow, args.envs.clone())?;
        info!(workflow = %workflow, run_id = %run_id, "waiting for workflow run");
        panel.engine.wait_idle().await;
        return Ok(false);
    }

    let Some(task_id) = args.task else {
        return Ok(false);
    };
    let report = panel.service.run_task(task_id, args.envs.clone()).await?;
    debug!(task_id, status = %report.result.status, "task finished; waiting for downstream hops");
    panel.engine.wait_idle().await;
    Ok(!report.result.is_success())
}

fn print_summary(panel: &Panel) {
    let records = panel.store.records();
    if records.is_empty() {
        return;
    }
    println!();
    println!("executions ({}):", records.len());
    for r in records {
        let run = r.workflow_run_id.as_deref().unwrap_or("-");
        println!(
            "  #{:<4} task {:<4} {:<8} exit {:<4} {:>6} ms  run {}",
            r.log_id.0, r.task_id, r.status.as_str(), r.exit_code, r.duration_ms, run
        );
    }
}

/// Simple dry-run output: engine settings, tasks and workflows.
fn print_dry_run(cfg: &PanelFile, base_dir: &Path) -> Result<()> {
    println!("taskdeck dry-run");
    println!(
        "  engine.default_timeout_minutes = {}",
        cfg.engine.default_timeout_minutes
    );
    println!("  engine.env_prefix = {}", cfg.engine.env_prefix);
    println!("  engine.demo_mode = {}", cfg.engine.demo_mode);
    println!();

    println!("tasks ({}):", cfg.tasks.len());
    for task in cfg.task_defs() {
        println!("  - {} ({})", task.id, task.name);
        if !task.command.is_empty() {
            println!("      cmd: {}", task.command);
        }
        if let Some(tags) = &task.tags {
            println!("      tags: {tags}");
        }
        if !task.envs.is_empty() {
            let keys: Vec<_> = task.envs.iter().map(|(k, _)| k.as_str()).collect();
            println!("      envs: {keys:?}");
        }
    }

    let workflows = resolve_workflows(cfg, base_dir)?;
    println!();
    println!("workflows ({}):", workflows.len());
    for wf in workflows {
        let state = if wf.enabled { "enabled" } else { "disabled" };
        match crate::workflow::parse_flow(&wf.id, &wf.flow_data) {
            Ok(flow) => println!(
                "  - {} ({state}): {} nodes, {} edges",
                wf.id,
                flow.nodes.len(),
                flow.edges.len()
            ),
            Err(e) if wf.flow_data.trim().is_empty() => {
                debug!(error = %e, "empty graph");
                println!("  - {} ({state}): empty graph", wf.id);
            }
            Err(e) => println!("  - {} ({state}): unreadable graph: {e}", wf.id),
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
