// src/dag/mod.rs

//! Container dependency graph.
//!
//! - [`graph`] holds the per-task dependency graph, including implicit
//!   edges from links and shared volumes.
//! - [`resolver`] validates a task at admission and answers whether a
//!   container's next transition is unblocked.

pub mod graph;
pub mod resolver;

pub use graph::{DependencyGraph, effective_dependencies};
pub use resolver::{dependencies_are_resolved, validate_dependencies};
