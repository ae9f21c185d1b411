// src/eni/link.rs

use anyhow::Result;

use crate::api::normalize_mac;
use crate::runtime::BoxFuture;

/// A host network link as seen by the attachment watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkLink {
    pub name: String,
    pub mac_address: String,
}

impl NetworkLink {
    pub fn new(name: impl Into<String>, mac_address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mac_address: normalize_mac(&mac_address.into()),
        }
    }
}

/// Source of the host's network links (netlink in production).
pub trait LinkLister: Send + Sync {
    fn list_links(&self) -> BoxFuture<'_, Result<Vec<NetworkLink>>>;

    fn link_by_name<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<NetworkLink>>;
}

/// A device hot-plug notification (udev in production).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub action: String,
    pub subsystem: String,
    pub dev_path: String,
}

impl LinkEvent {
    pub fn new(
        action: impl Into<String>,
        subsystem: impl Into<String>,
        dev_path: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            subsystem: subsystem.into(),
            dev_path: dev_path.into(),
        }
    }

    pub fn is_add(&self) -> bool {
        self.action == "add"
    }

    /// Interface name of a network device event.
    ///
    /// `None` for other subsystems and for device paths that do not end in a
    /// name, e.g. `/devices/pci0000:00/0000:00:05.0/net/eth1` gives `eth1`.
    pub fn interface_name(&self) -> Option<&str> {
        if self.subsystem != "net" {
            return None;
        }
        let (parent, name) = self.dev_path.trim_end_matches('/').rsplit_once('/')?;
        if name.is_empty() || !parent.ends_with("/net") {
            return None;
        }
        Some(name)
    }
}
