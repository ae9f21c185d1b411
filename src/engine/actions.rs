// src/engine/actions.rs

//! Runtime-facing side of a transition.
//!
//! Each function here runs one [`Action`] against the collaborators and
//! bounds it by the action's timeout. Results go back to the task worker as
//! an [`ActionResult`]; nothing here touches the task's state directly.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, warn};

use crate::api::{Container, ContainerKind, TaskStatus, Task};
use crate::config::EngineConfig;
use crate::network::build_namespace_config;
use crate::runtime::{CreateSpec, RuntimeError, RuntimeResult};

use super::context::EngineContext;
use super::task_core::{ActionOutput, ActionResult};
use super::transition::{Action, Transition};

/// One action to run, with a snapshot of the task it belongs to.
pub(crate) struct ActionRequest {
    pub task: Task,
    pub container: String,
    pub transition: Transition,
    /// The task's live desired status.
    pub desired: watch::Receiver<TaskStatus>,
}

pub(crate) async fn execute(ctx: &EngineContext, req: ActionRequest) -> ActionResult {
    let Some(container) = req.task.container(&req.container) else {
        return ActionResult::Failed(RuntimeError::fatal(format!(
            "container {} is not part of task {}",
            req.container, req.task.arn
        )));
    };
    let limit = req.transition.timeout;

    debug!(
        task = %req.task.arn,
        container = %container.name,
        action = %req.transition.action,
        timeout = ?limit,
        "running action"
    );

    let result = match req.transition.action {
        Action::Pull => return pull(ctx, &req, container, limit).await,
        Action::Create => create(ctx, &req.task, container, limit).await,
        Action::Start => start(ctx, container, limit).await,
        Action::Provision => provision(ctx, &req.task, container, limit).await,
        Action::Stop => stop(ctx, &req.task, container, limit).await,
        Action::Remove => remove(ctx, container, limit).await.map(|_| ActionOutput::default()),
    };

    match result {
        Ok(output) => ActionResult::Done(output),
        Err(err) => ActionResult::Failed(err),
    }
}

/// Run `fut`, turning an elapsed `limit` into a timeout error.
pub(crate) async fn bounded<T>(
    operation: &str,
    limit: Duration,
    fut: impl Future<Output = RuntimeResult<T>>,
) -> RuntimeResult<T> {
    match time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RuntimeError::timed_out(operation, limit)),
    }
}

async fn pull(
    ctx: &EngineContext,
    req: &ActionRequest,
    container: &Container,
    limit: Duration,
) -> ActionResult {
    // The network-setup image ships with the host.
    if container.kind == ContainerKind::NetworkSetup {
        return ActionResult::Done(ActionOutput::default());
    }

    let _guard = if ctx.concurrent_pull_enabled() {
        None
    } else {
        Some(ctx.pull_lock.lock().await)
    };

    if req.desired.borrow().is_terminal() {
        debug!(
            task = %req.task.arn,
            container = %container.name,
            "task stopping; skipping image pull"
        );
        return ActionResult::Skipped;
    }

    match bounded("pull", limit, ctx.runtime.pull_image(&container.image)).await {
        Ok(()) => {
            ctx.save();
            ActionResult::Done(ActionOutput::default())
        }
        Err(err) => ActionResult::Failed(err),
    }
}

async fn create(
    ctx: &EngineContext,
    task: &Task,
    container: &Container,
    limit: Duration,
) -> RuntimeResult<ActionOutput> {
    let name = container.runtime_name.clone().ok_or_else(|| {
        RuntimeError::fatal(format!("container {} has no runtime name", container.name))
    })?;

    // The name must be on disk before the runtime can know it.
    ctx.force_save();

    let spec = create_spec(&ctx.config, task, container, name);
    let runtime_id = bounded("create", limit, ctx.runtime.create_container(&spec)).await?;
    Ok(ActionOutput {
        runtime_id: Some(runtime_id),
        exit_code: None,
    })
}

async fn start(
    ctx: &EngineContext,
    container: &Container,
    limit: Duration,
) -> RuntimeResult<ActionOutput> {
    let id = runtime_id(container)?;
    let metadata = bounded("start", limit, ctx.runtime.start_container(id)).await?;
    Ok(ActionOutput {
        runtime_id: None,
        exit_code: metadata.exit_code,
    })
}

async fn provision(
    ctx: &EngineContext,
    task: &Task,
    container: &Container,
    limit: Duration,
) -> RuntimeResult<ActionOutput> {
    let id = runtime_id(container)?;
    let details = bounded(
        "inspect",
        ctx.config.timeouts.inspect,
        ctx.runtime.inspect_container(id),
    )
    .await?;
    let config = build_namespace_config(task, &details, ctx.config.block_instance_metadata)
        .map_err(|e| RuntimeError::fatal(e.to_string()))?;

    bounded("provision", limit, async {
        ctx.network
            .setup_namespace(&config)
            .await
            .map_err(|e| RuntimeError::transient(format!("setup namespace: {e:#}")))
    })
    .await?;
    Ok(ActionOutput::default())
}

async fn stop(
    ctx: &EngineContext,
    task: &Task,
    container: &Container,
    limit: Duration,
) -> RuntimeResult<ActionOutput> {
    let id = runtime_id(container)?;

    if container.kind == ContainerKind::NetworkSetup {
        cleanup_namespace(ctx, task, id).await;
    }

    let metadata = bounded("stop", limit, ctx.runtime.stop_container(id)).await?;
    Ok(ActionOutput {
        runtime_id: None,
        exit_code: metadata.exit_code,
    })
}

/// Tear the task's namespace down before its holder stops. Failures are
/// logged; the stop goes ahead regardless.
async fn cleanup_namespace(ctx: &EngineContext, task: &Task, id: &str) {
    let details = match bounded(
        "inspect",
        ctx.config.timeouts.inspect,
        ctx.runtime.inspect_container(id),
    )
    .await
    {
        Ok(details) => details,
        Err(err) => {
            warn!(task = %task.arn, error = %err, "inspect before namespace cleanup failed");
            return;
        }
    };

    let config = match build_namespace_config(task, &details, ctx.config.block_instance_metadata) {
        Ok(config) => config,
        Err(err) => {
            warn!(task = %task.arn, error = %err, "cannot build namespace config");
            return;
        }
    };

    if let Err(err) = ctx.network.cleanup_namespace(&config).await {
        warn!(task = %task.arn, error = %err, "namespace cleanup failed");
    }
}

pub(crate) async fn remove(
    ctx: &EngineContext,
    container: &Container,
    limit: Duration,
) -> RuntimeResult<()> {
    let id = runtime_id(container)?;
    bounded("remove", limit, ctx.runtime.remove_container(id)).await
}

fn runtime_id(container: &Container) -> RuntimeResult<&str> {
    container.runtime_id.as_deref().ok_or_else(|| {
        RuntimeError::fatal(format!("container {} has no runtime id", container.name))
    })
}

/// Build the runtime create spec, merging engine labels over user labels
/// and joining the task's network namespace when it has one.
pub fn create_spec(
    config: &EngineConfig,
    task: &Task,
    container: &Container,
    name: String,
) -> CreateSpec {
    let mut labels: BTreeMap<String, String> = container.labels.clone();
    let prefix = &config.label_prefix;
    labels.insert(format!("{prefix}task-arn"), task.arn.clone());
    labels.insert(format!("{prefix}container-name"), container.name.clone());
    labels.insert(format!("{prefix}task-definition-family"), task.family.clone());
    labels.insert(format!("{prefix}task-definition-version"), task.version.clone());
    labels.insert(format!("{prefix}cluster"), config.cluster.clone());

    let network_mode = match container.kind {
        ContainerKind::NetworkSetup => Some("none".to_string()),
        ContainerKind::Normal => task
            .network_setup_container()
            .and_then(|setup| setup.runtime_id.as_ref())
            .map(|id| format!("container:{id}"))
            .or_else(|| container.network_mode.clone()),
    };

    CreateSpec {
        name,
        image: container.image.clone(),
        command: container.command.clone(),
        environment: container.environment.clone(),
        labels,
        network_mode,
    }
}
