// src/engine/mod.rs

//! Task engine.
//!
//! This module ties together:
//! - the engine-wide registry ([`state`]) and the stop-before-start gate
//!   ([`sequencing`])
//! - the runtime event dispatcher, which routes each event to the worker
//!   owning the container
//! - one worker per task: the pure per-task state machine lives in
//!   [`task_core`]; the async/IO shell around it in `managed_task`
//! - the transition table and failure classification ([`transition`])
//!
//! [`TaskEngine`] is the public entry point.

mod actions;
mod context;
mod dispatcher;
mod managed_task;
mod task_handlers;

pub mod sequencing;
pub mod state;
pub mod task_core;
pub mod task_engine;
pub mod transition;

pub use actions::create_spec;
pub use sequencing::SequentialWaitGroup;
pub use state::{ContainerRef, EngineState};
pub use task_core::{
    ActionOutput, ActionResult, TaskCommand, TaskCore, TaskInput, TaskPhase, TaskStep, runtime_name,
};
pub use task_engine::TaskEngine;
pub use transition::{Action, Disposition, NextStep, RetryPolicy, Transition, classify, next_step};
