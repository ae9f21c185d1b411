// src/api/attachment.rs

use serde::{Deserialize, Serialize};

use super::status::AttachmentStatus;

/// An elastic network interface attached to a task.
///
/// Looked up by MAC address during reconciliation. `sent` flips to true once
/// an attachment state change naming it has been delivered outward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EniAttachment {
    pub task_arn: String,
    pub attachment_arn: String,
    pub mac_address: String,

    #[serde(default)]
    pub ipv4_addresses: Vec<String>,

    #[serde(default)]
    pub ipv6_addresses: Vec<String>,

    #[serde(default)]
    pub status: AttachmentStatus,

    #[serde(default)]
    pub sent: bool,
}

impl EniAttachment {
    pub fn new(
        task_arn: impl Into<String>,
        attachment_arn: impl Into<String>,
        mac_address: impl Into<String>,
    ) -> Self {
        Self {
            task_arn: task_arn.into(),
            attachment_arn: attachment_arn.into(),
            mac_address: normalize_mac(&mac_address.into()),
            ipv4_addresses: Vec::new(),
            ipv6_addresses: Vec::new(),
            status: AttachmentStatus::None,
            sent: false,
        }
    }
}

/// Lower-case a MAC address so lookups are case-insensitive.
pub fn normalize_mac(mac: &str) -> String {
    mac.trim().to_ascii_lowercase()
}
