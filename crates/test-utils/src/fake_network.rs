use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use taskengine::eni::{LinkLister, NetworkLink};
use taskengine::network::{NamespaceConfig, NetworkSetup};
use taskengine::runtime::BoxFuture;

/// One call into the network collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkCall {
    Setup(NamespaceConfig),
    Cleanup(NamespaceConfig),
    Release(NamespaceConfig),
}

/// A `NetworkSetup` that records calls and can fail `setup_namespace`.
#[derive(Clone, Default)]
pub struct RecordingNetwork {
    calls: Arc<Mutex<Vec<NetworkCall>>>,
    setup_failures: Arc<Mutex<VecDeque<String>>>,
}

impl RecordingNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_setup(&self, message: &str) {
        self.setup_failures
            .lock()
            .unwrap()
            .push_back(message.to_string());
    }

    pub fn calls(&self) -> Vec<NetworkCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: NetworkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl NetworkSetup for RecordingNetwork {
    fn setup_namespace<'a>(&'a self, config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.record(NetworkCall::Setup(config.clone()));
            match self.setup_failures.lock().unwrap().pop_front() {
                Some(message) => Err(anyhow!(message)),
                None => Ok(()),
            }
        })
    }

    fn cleanup_namespace<'a>(&'a self, config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.record(NetworkCall::Cleanup(config.clone()));
            Ok(())
        })
    }

    fn release_ip_resource<'a>(&'a self, config: &'a NamespaceConfig) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.record(NetworkCall::Release(config.clone()));
            Ok(())
        })
    }
}

/// A `LinkLister` over an editable list of links.
#[derive(Clone, Default)]
pub struct FakeLinkLister {
    links: Arc<Mutex<Vec<NetworkLink>>>,
    fail: Arc<Mutex<bool>>,
}

impl FakeLinkLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_link(&self, name: &str, mac: &str) {
        self.links.lock().unwrap().push(NetworkLink::new(name, mac));
    }

    /// Make every call fail until reset.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    fn failing(&self) -> bool {
        *self.fail.lock().unwrap()
    }
}

impl LinkLister for FakeLinkLister {
    fn list_links(&self) -> BoxFuture<'_, anyhow::Result<Vec<NetworkLink>>> {
        Box::pin(async move {
            if self.failing() {
                return Err(anyhow!("netlink: operation not permitted"));
            }
            Ok(self.links.lock().unwrap().clone())
        })
    }

    fn link_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, anyhow::Result<NetworkLink>> {
        Box::pin(async move {
            if self.failing() {
                return Err(anyhow!("netlink: operation not permitted"));
            }
            self.links
                .lock()
                .unwrap()
                .iter()
                .find(|l| l.name == name)
                .cloned()
                .ok_or_else(|| anyhow!("link {name} not found"))
        })
    }
}
