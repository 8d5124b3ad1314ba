//! RPC-specific error types.

use thiserror::Error;

/// Result type for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors that can occur while talking to the RPC server.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Failed to establish the websocket connection.
    #[error("failed to connect to {url}: {message}")]
    ConnectFailed {
        /// Server URL the connection was attempted against.
        url: String,
        /// Underlying failure message.
        message: String,
    },

    /// Failed to send a frame over the connection.
    #[error("failed to send RPC frame: {0}")]
    SendFailed(String),

    /// Failed to serialize a frame to JSON.
    #[error("failed to serialize RPC frame: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    /// Failed to deserialize a result payload.
    #[error("failed to deserialize RPC result: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// Method call timed out.
    #[error("RPC call '{method}' timed out after {seconds} seconds")]
    Timeout {
        /// Method that timed out.
        method: String,
        /// Configured timeout.
        seconds: u64,
    },

    /// The connection closed while a call was pending.
    #[error("RPC connection closed unexpectedly")]
    ConnectionClosed,

    /// Server returned an error response.
    #[error("{message} (code: {code})")]
    Remote {
        /// Error code from the server.
        code: String,
        /// Error message from the server.
        message: String,
    },

    /// Plain HTTP fetch failed (signed-URL file reads).
    #[error("http request failed: {0}")]
    Http(String),

    /// Interactive login did not complete in time.
    #[error("login was not completed within {0} seconds")]
    LoginTimeout(u64),
}

impl RpcError {
    /// Create a remote error from an error response.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }
}
