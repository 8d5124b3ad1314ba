//! Engine-specific error types.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while talking to a query engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine worker process.
    #[error("failed to spawn engine worker: {0}")]
    SpawnFailed(#[source] io::Error),

    /// Failed to write to worker stdin.
    #[error("failed to write to engine worker: {0}")]
    WriteFailed(#[source] io::Error),

    /// Failed to read from worker stdout.
    #[error("failed to read from engine worker: {0}")]
    ReadFailed(#[source] io::Error),

    /// Failed to serialize request to JSON.
    #[error("failed to serialize engine request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize response from JSON.
    #[error("failed to deserialize engine response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Request timed out waiting for response.
    #[error("engine request timed out after {0} seconds")]
    Timeout(u64),

    /// Worker process exited unexpectedly.
    #[error("engine worker exited unexpectedly")]
    WorkerExited,

    /// Response channel was closed (internal error).
    #[error("engine response channel closed unexpectedly")]
    ChannelClosed,

    /// The engine rejected the SQL. The message is surfaced verbatim.
    #[error("{0}")]
    Sql(String),

    /// The engine does not support the requested extension operation.
    #[error("extension '{0}' is not supported by this engine")]
    ExtensionUnsupported(String),

    /// Engine returned an error response with an unrecognized code.
    #[error("engine error: {message} (code: {code})")]
    Remote {
        /// Error code from the worker.
        code: String,
        /// Error message from the worker.
        message: String,
    },
}

impl EngineError {
    /// Create a remote error from an error response.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Check if this error indicates the worker has exited.
    pub fn is_worker_exited(&self) -> bool {
        matches!(self, Self::WorkerExited | Self::ChannelClosed)
    }
}

impl From<io::Error> for EngineError {
    fn from(err: io::Error) -> Self {
        Self::WriteFailed(err)
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for EngineError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}
