// src/runtime/client.rs

//! Container runtime abstraction.
//!
//! The engine never talks to a runtime daemon directly. It drives a
//! [`ContainerRuntime`], so tests can plug in a fake that records calls and
//! scripts failures while production wires a real client.
//!
//! Timeouts are enforced by the engine around every call; implementations
//! do not need their own.

use tokio::sync::mpsc;

use crate::api::ContainerStatus;

use super::BoxFuture;
use super::error::RuntimeResult;
use super::event::{ContainerChangeEvent, ContainerDetails, ContainerMetadata, CreateSpec};

pub trait ContainerRuntime: Send + Sync {
    fn pull_image<'a>(&'a self, image: &'a str) -> BoxFuture<'a, RuntimeResult<()>>;

    /// Create a container and return its runtime id.
    fn create_container<'a>(&'a self, spec: &'a CreateSpec) -> BoxFuture<'a, RuntimeResult<String>>;

    fn start_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<ContainerMetadata>>;

    /// Stop a container. A container that is already stopped must be
    /// reported as [`RuntimeErrorKind::NotRunning`](super::RuntimeErrorKind::NotRunning).
    fn stop_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<ContainerMetadata>>;

    fn remove_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<()>>;

    fn inspect_container<'a>(&'a self, id: &'a str) -> BoxFuture<'a, RuntimeResult<ContainerDetails>>;

    /// Current status of a container. A container the runtime no longer
    /// knows about is reported as STOPPED with `metadata.error` set.
    fn describe_status<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, (ContainerStatus, ContainerMetadata)>;

    /// Subscribe to the runtime's container event stream.
    fn subscribe_events(&self) -> BoxFuture<'_, RuntimeResult<mpsc::Receiver<ContainerChangeEvent>>>;

    fn version(&self) -> BoxFuture<'_, RuntimeResult<String>>;
}
