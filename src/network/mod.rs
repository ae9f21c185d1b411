// src/network/mod.rs

//! Network namespace collaborator.
//!
//! Tasks with an ENI attachment run inside a namespace held open by their
//! network-setup container. The engine tells a [`NetworkSetup`]
//! implementation when to wire the interface into that namespace and when
//! to tear it down again.

use crate::api::Task;
use crate::errors::{EngineError, Result};
use crate::runtime::{BoxFuture, ContainerDetails};

/// Everything needed to configure one task's namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    pub task_arn: String,
    pub container_id: String,
    pub container_pid: u32,
    pub mac_address: String,
    pub ipv4_addresses: Vec<String>,
    pub ipv6_addresses: Vec<String>,
    pub block_instance_metadata: bool,
}

pub trait NetworkSetup: Send + Sync {
    fn setup_namespace<'a>(&'a self, config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>>;

    fn cleanup_namespace<'a>(&'a self, config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>>;

    fn release_ip_resource<'a>(&'a self, config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>>;
}

/// A [`NetworkSetup`] for hosts that never run ENI tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNetwork;

impl NetworkSetup for NoopNetwork {
    fn setup_namespace<'a>(&'a self, _config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn cleanup_namespace<'a>(&'a self, _config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn release_ip_resource<'a>(&'a self, _config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Build the namespace config for `task` from the inspected network-setup
/// container.
pub fn build_namespace_config(
    task: &Task,
    details: &ContainerDetails,
    block_instance_metadata: bool,
) -> Result<NamespaceConfig> {
    let eni = task.eni.as_ref().ok_or_else(|| {
        EngineError::Network(format!("task {} has no network interface attached", task.arn))
    })?;

    Ok(NamespaceConfig {
        task_arn: task.arn.clone(),
        container_id: details.runtime_id.clone(),
        container_pid: details.pid,
        mac_address: eni.mac_address.clone(),
        ipv4_addresses: eni.ipv4_addresses.clone(),
        ipv6_addresses: eni.ipv6_addresses.clone(),
        block_instance_metadata,
    })
}

/// Namespace config used when no container is left to inspect, e.g. to
/// release the task's addresses during cleanup.
pub fn release_config(task: &Task, block_instance_metadata: bool) -> Result<NamespaceConfig> {
    let container_id = task
        .network_setup_container()
        .and_then(|c| c.runtime_id.clone())
        .unwrap_or_default();
    let details = ContainerDetails {
        runtime_id: container_id,
        ..ContainerDetails::default()
    };
    build_namespace_config(task, &details, block_instance_metadata)
}
