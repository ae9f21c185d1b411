// src/runtime/error.rs

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// How the engine should read a failed runtime call.
///
/// Runtime backends map their client library's errors into one of these
/// kinds; the engine never inspects library-specific error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeErrorKind {
    /// Transport hiccup or a busy daemon. Worth retrying.
    Transient,
    /// The container is not running (for example on stop).
    NotRunning,
    /// The container or image does not exist.
    NotFound,
    /// The call did not finish in time; its outcome is unknown.
    Timeout,
    /// Anything retrying will not fix.
    Fatal,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeErrorKind::Transient => "transient",
            RuntimeErrorKind::NotRunning => "not running",
            RuntimeErrorKind::NotFound => "not found",
            RuntimeErrorKind::Timeout => "timeout",
            RuntimeErrorKind::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Transient, message)
    }

    pub fn not_running(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::NotRunning, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::NotFound, message)
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Fatal, message)
    }

    /// The error recorded when the engine gives up waiting on a call.
    pub fn timed_out(operation: &str, after: Duration) -> Self {
        Self::new(
            RuntimeErrorKind::Timeout,
            format!("{operation} did not complete within {after:?}"),
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == RuntimeErrorKind::Timeout
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;
