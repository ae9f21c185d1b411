// src/engine/dispatcher.rs

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::runtime::ContainerChangeEvent;

use super::state::EngineState;
use super::task_core::TaskInput;

/// Route runtime events to the worker owning the container.
///
/// The runtime stream has exactly one consumer: this loop. Events for ids
/// no task owns (never ours, or already cleaned up) are dropped.
pub(crate) async fn dispatch_runtime_events(
    state: Arc<EngineState>,
    mut events: mpsc::Receiver<ContainerChangeEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("runtime event dispatcher started");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => route(&state, event).await,
                None => {
                    warn!("runtime event stream closed; dispatcher exiting");
                    break;
                }
            },
            _ = shutdown.changed() => {
                info!("shutdown requested; dispatcher exiting");
                break;
            }
        }
    }
}

async fn route(state: &EngineState, event: ContainerChangeEvent) {
    let Some((owner, worker)) = state.route(&event.runtime_id) else {
        debug!(
            runtime_id = %event.runtime_id,
            status = %event.status,
            "dropping event for unknown container"
        );
        return;
    };

    debug!(
        task = %owner.task_arn,
        container = %owner.container_name,
        status = %event.status,
        "routing runtime event"
    );
    let input = TaskInput::ContainerEvent {
        container: owner.container_name,
        status: event.status,
        metadata: event.metadata,
    };
    if worker.send(input).await.is_err() {
        debug!(task = %owner.task_arn, "task worker gone; event dropped");
    }
}
