//! Query engine collaborator boundary.
//!
//! The session layer talks to a query engine through the [`EngineConnection`]
//! trait, never to a concrete engine. Two execution strategies exist:
//!
//! - **Worker** ([`WorkerEngine`]): the engine runs isolated in a child
//!   process and is spoken to over NDJSON on stdin/stdout.
//! - **In-process** ([`InProcessEngine`]): an embedded engine running on the
//!   caller's runtime, used when the worker cannot be started.
//!
//! Which strategy is used is decided at runtime acquisition time
//! (`session::runtime`); everything downstream only ever sees the trait.

mod bundle;
mod error;
mod inprocess;
pub mod protocol;
mod worker;

use async_trait::async_trait;

pub use bundle::{select_bundle, Bundle, WORKER_BINARY_NAME};
pub use error::{EngineError, EngineResult};
pub use inprocess::InProcessEngine;
pub use protocol::TabularResult;
pub use worker::WorkerEngine;

/// Where a connection's engine executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// Isolated worker child process.
    Worker,
    /// Embedded engine on the caller's runtime.
    InProcess,
}

impl ExecutionStrategy {
    /// Short label used in logs and status text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::InProcess => "in-process",
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// An open connection to an initialized query engine.
///
/// One connection is acquired per session and reused for its whole lifetime.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Execute SQL and return the normalized result.
    async fn query(&self, sql: &str) -> EngineResult<TabularResult>;

    /// Install an optional engine extension.
    async fn install_extension(&self, name: &str) -> EngineResult<()>;

    /// Load a previously installed engine extension.
    async fn load_extension(&self, name: &str) -> EngineResult<()>;

    /// Which execution strategy backs this connection.
    fn strategy(&self) -> ExecutionStrategy;
}
