//! Session-level error taxonomy.

use thiserror::Error;

use crate::engine::EngineError;
use crate::rpc::RpcError;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// One failed acquisition attempt.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    /// Name of the strategy that was attempted.
    pub strategy: String,
    /// The failure message.
    pub message: String,
}

/// All acquisition attempts, aggregated for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionFailure(pub Vec<StrategyFailure>);

impl std::fmt::Display for AcquisitionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no execution strategies were attempted");
        }
        let mut first = true;
        for attempt in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", attempt.strategy, attempt.message)?;
            first = false;
        }
        Ok(())
    }
}

/// Errors surfaced by the session layer.
///
/// Failures propagate to the immediate caller carrying the underlying
/// message; only artifact-listing failures are absorbed (see
/// `artifact::resolve_artifact`).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Every execution strategy failed. Fatal to all downstream operations
    /// until a fresh acquisition attempt; nothing is cached, so a later
    /// call retries from scratch.
    #[error("engine initialization failed: {0}")]
    RuntimeInitialization(AcquisitionFailure),

    /// The optional streaming capability could not be installed. Non-fatal;
    /// logged and never retried within the session.
    #[error("failed to install extension '{name}': {message}")]
    CapabilityInstall {
        /// Extension name.
        name: String,
        /// Underlying failure message.
        message: String,
    },

    /// No artifact in the listing matched the key.
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Neither the default dataset filename nor any declared file with the
    /// expected extension yielded a usable URL. Carries the original
    /// default-filename failure.
    #[error("no dataset file found in artifact '{artifact}': {message}")]
    DatasetFileNotFound {
        /// Artifact id.
        artifact: String,
        /// Message of the original failure.
        message: String,
    },

    /// The engine rejected the SQL; the message is surfaced verbatim.
    #[error("{0}")]
    QueryExecution(String),

    /// A failure from the RPC collaborator, propagated un-wrapped.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl SessionError {
    /// Wrap an engine failure as a query-execution failure, keeping the
    /// engine's message verbatim.
    pub(crate) fn query(err: EngineError) -> Self {
        Self::QueryExecution(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_failure_display() {
        let failure = AcquisitionFailure(vec![
            StrategyFailure {
                strategy: "worker".to_string(),
                message: "binary not found".to_string(),
            },
            StrategyFailure {
                strategy: "in-process".to_string(),
                message: "out of memory".to_string(),
            },
        ]);
        assert_eq!(
            failure.to_string(),
            "worker: binary not found; in-process: out of memory"
        );

        assert_eq!(
            AcquisitionFailure::default().to_string(),
            "no execution strategies were attempted"
        );
    }
}
