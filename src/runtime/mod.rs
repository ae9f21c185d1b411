// src/runtime/mod.rs

//! The container runtime as seen by the engine.
//!
//! - [`client`]: the [`ContainerRuntime`] trait every runtime backend implements.
//! - [`error`]: the error-kind contract runtime backends map their errors into.
//! - [`event`]: change events, create specs and inspect details.
//! - [`version`]: runtime version parsing for feature probing.

pub mod client;
pub mod error;
pub mod event;
pub mod version;

use std::future::Future;
use std::pin::Pin;

pub use client::ContainerRuntime;
pub use error::{RuntimeError, RuntimeErrorKind, RuntimeResult};
pub use event::{ContainerChangeEvent, ContainerDetails, ContainerMetadata, CreateSpec};
pub use version::RuntimeVersion;

/// Boxed future returned by collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
