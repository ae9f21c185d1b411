// src/lib.rs

pub mod api;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod eni;
pub mod errors;
pub mod logging;
pub mod network;
pub mod runtime;
pub mod statemanager;

use std::path::Path;

use anyhow::{Result, bail};
use tracing::{debug, info, warn};

use crate::api::Task;
use crate::cli::CliArgs;
use crate::config::{EngineConfig, default_config_path, load_and_validate, load_tasks, validate_config};
use crate::dag::{DependencyGraph, validate_dependencies};
use crate::engine::{create_spec, runtime_name};

pub use crate::engine::TaskEngine;

/// How one task definition would be admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    pub arn: String,
    /// Container start order, or why the engine would reject the task.
    pub start_order: std::result::Result<Vec<String>, String>,
}

/// High-level entry point used by `main.rs`.
///
/// Loads the engine config and the task definitions, then prints the start
/// plan of every task. Fails if any definition would be rejected.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = resolve_config(args.config.as_deref())?;
    let tasks = load_tasks(&args.tasks)?;
    info!(tasks = tasks.len(), path = ?args.tasks, "task definitions loaded");

    let plans = plan_tasks(&cfg, &tasks);
    print_plans(&plans);

    if args.dry_run {
        print_dry_run(&cfg, &tasks);
    }

    let rejected = plans.iter().filter(|p| p.start_order.is_err()).count();
    if rejected > 0 {
        bail!("{rejected} of {} task definitions are invalid", plans.len());
    }
    Ok(())
}

/// Explicit config path, else `taskengine.toml` if present, else defaults.
fn resolve_config(path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = path {
        return Ok(load_and_validate(path)?);
    }

    let fallback = default_config_path();
    if fallback.exists() {
        debug!(path = ?fallback, "using default config file");
        return Ok(load_and_validate(&fallback)?);
    }

    let cfg = EngineConfig::default();
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Validate each task as the engine would at admission and compute the
/// order its containers start in.
pub fn plan_tasks(cfg: &EngineConfig, tasks: &[Task]) -> Vec<TaskPlan> {
    tasks
        .iter()
        .map(|task| {
            let mut task = task.clone();
            task.add_network_setup_container(&cfg.pause_image);

            let start_order = match validate_dependencies(&task) {
                Ok(()) => DependencyGraph::from_task(&task)
                    .start_order()
                    .ok_or_else(|| "dependency graph has a cycle".to_string()),
                Err(err) => {
                    warn!(task = %task.arn, error = %err, "task definition rejected");
                    Err(err.to_string())
                }
            };
            TaskPlan {
                arn: task.arn,
                start_order,
            }
        })
        .collect()
}

fn print_plans(plans: &[TaskPlan]) {
    println!("tasks ({}):", plans.len());
    for plan in plans {
        match plan.start_order {
            Ok(ref order) => {
                println!("  - {}", plan.arn);
                println!("      start order: {}", order.join(" -> "));
            }
            Err(ref reason) => {
                println!("  - {} (rejected)", plan.arn);
                println!("      reason: {reason}");
            }
        }
    }
}

fn print_dry_run(cfg: &EngineConfig, tasks: &[Task]) {
    println!();
    println!("config:");
    println!("  engine.cluster = {}", cfg.cluster);
    println!("  engine.pause_image = {}", cfg.pause_image);
    println!("  engine.label_prefix = {}", cfg.label_prefix);
    println!("  engine.runtime_name_prefix = {}", cfg.runtime_name_prefix);
    println!("  engine.state_change_buffer = {}", cfg.state_change_buffer);
    println!("  engine.task_inbox_size = {}", cfg.task_inbox_size);
    println!(
        "  engine.concurrent_pull_min_version = {}",
        cfg.concurrent_pull_min_version
    );
    println!(
        "  engine.max_transition_attempts = {}",
        cfg.max_transition_attempts
    );
    println!(
        "  engine.block_instance_metadata = {}",
        cfg.block_instance_metadata
    );
    println!("  timeouts = {:?}", cfg.timeouts);
    println!(
        "  intervals.steady_state_verify = {:?}",
        cfg.steady_state_verify_interval
    );
    println!("  intervals.task_cleanup_wait = {:?}", cfg.task_cleanup_wait);
    println!(
        "  intervals.transition_retry_delay = {:?}",
        cfg.transition_retry_delay
    );
    println!(
        "  intervals.attachment_reconcile = {:?}",
        cfg.attachment_reconcile_interval
    );

    println!();
    println!("containers:");
    for task in tasks {
        let mut task = task.clone();
        task.add_network_setup_container(&cfg.pause_image);
        println!("  {}", task.arn);
        for container in task.containers.iter() {
            let name = runtime_name(&cfg.runtime_name_prefix, &task, &container.name);
            let spec = create_spec(cfg, &task, container, name);
            println!("    - {} as {}", container.name, spec.name);
            println!("        image: {}", spec.image);
            if let Some(ref mode) = spec.network_mode {
                println!("        network: {mode}");
            }
            if !spec.command.is_empty() {
                println!("        command: {:?}", spec.command);
            }
            for (key, value) in spec.labels.iter() {
                println!("        label {key} = {value}");
            }
        }
    }

    debug!("dry-run complete (no runtime contacted)");
}
