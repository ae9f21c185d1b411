// src/eni/mod.rs

//! Network interface attachments.
//!
//! - [`link`]: host links and hot-plug events as the watcher sees them.
//! - [`watcher`]: reports an attachment once its interface appears.

pub mod link;
pub mod watcher;

pub use link::{LinkEvent, LinkLister, NetworkLink};
pub use watcher::EniWatcher;
