//! Core error type for the PTY session engine.
//!
//! The tool surface (`server.rs`) converts every variant here into the exact
//! user-visible text spec'd at the boundary; nothing in this crate panics or
//! aborts the process on a recoverable failure.

use thiserror::Error;

/// Errors produced by the PTY session engine.
#[derive(Debug, Error)]
pub enum PtyError {
    /// Invalid startup configuration (e.g. a `--log-dir` that doesn't exist).
    #[error("configuration error: {0}")]
    Config(String),

    /// `max_sessions` has been reached.
    #[error("Maximum sessions ({0}) reached")]
    Capacity(usize),

    /// A session id did not resolve to a live entry in the registry.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Forking or exec'ing the child, or preparing its PTY, failed.
    #[error("failed to spawn session: {0}")]
    Spawn(String),

    /// A PTY read or write failed fatally.
    #[error("PTY I/O error: {0}")]
    Io(String),

    /// A second `run_command` overlapped with one already in flight.
    #[error("session {0} is busy running another command")]
    Busy(String),
}

pub type PtyResult<T> = Result<T, PtyError>;
