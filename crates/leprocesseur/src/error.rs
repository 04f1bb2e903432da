//! Processor errors.

use crate::engine::RunState;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the orchestrator itself (never by a command).
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// State transition not allowed from the current state.
    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: RunState,
        /// Requested state.
        to: RunState,
    },

    /// The shared state lock was poisoned by a panicking observer.
    #[error("Processor state unavailable: {0}")]
    StateUnavailable(String),

    /// Snapshot file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Snapshot JSON could not be encoded or decoded.
    #[error("Snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// The background worker thread could not be started.
    #[error("Failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The background worker thread panicked.
    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// Result alias for processor operations.
pub type Result<T> = std::result::Result<T, ProcessorError>;
