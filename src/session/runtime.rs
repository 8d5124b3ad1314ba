//! Runtime acquisition: lazy, idempotent engine initialization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::{EngineSettings, Settings};
use crate::engine::{
    select_bundle, Bundle, EngineConnection, EngineError, EngineResult, ExecutionStrategy,
    InProcessEngine, WorkerEngine,
};

use super::error::{AcquisitionFailure, StrategyFailure};
use super::{SessionContext, SessionError, SessionResult};

/// Engine lifecycle status, observable through the session's watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// No acquisition has been attempted yet.
    Idle,
    /// An acquisition attempt is in flight.
    Initializing,
    /// A runtime is cached and ready.
    Ready,
    /// The last acquisition attempt failed on every strategy.
    Failed,
}

impl EngineStatus {
    /// Short label used in logs and status text.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A successfully acquired engine runtime.
pub struct RuntimeHandle {
    connection: Arc<dyn EngineConnection>,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("strategy", &self.connection.strategy())
            .finish()
    }
}

impl RuntimeHandle {
    pub(crate) fn new(connection: Arc<dyn EngineConnection>) -> Self {
        Self { connection }
    }

    /// The open engine connection.
    pub fn connection(&self) -> &Arc<dyn EngineConnection> {
        &self.connection
    }

    /// Which execution strategy backs this runtime.
    pub fn strategy(&self) -> ExecutionStrategy {
        self.connection.strategy()
    }
}

/// One way of bringing up an engine runtime.
///
/// Strategies are tried in list order during acquisition; the first success
/// wins and later entries are never consulted.
#[async_trait]
pub trait EngineStrategy: Send + Sync {
    /// Name used in logs and aggregated failure messages.
    fn name(&self) -> &'static str;

    /// Whether this strategy should be skipped outright for the selected
    /// bundle. A skipped strategy does not count as a failure.
    fn skip(&self, _bundle: &Bundle, _engine: &EngineSettings) -> bool {
        false
    }

    /// Attempt to bring up a connection.
    async fn connect(&self, bundle: &Bundle) -> EngineResult<Arc<dyn EngineConnection>>;
}

/// Strategy A: engine in an isolated worker child process.
pub struct WorkerStrategy {
    request_timeout: Duration,
}

impl WorkerStrategy {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl EngineStrategy for WorkerStrategy {
    fn name(&self) -> &'static str {
        "worker"
    }

    // In a dev session only a locally hosted worker binary is trusted;
    // anything resolved from the environment is skipped.
    fn skip(&self, bundle: &Bundle, engine: &EngineSettings) -> bool {
        engine.dev_mode && !bundle.local
    }

    async fn connect(&self, bundle: &Bundle) -> EngineResult<Arc<dyn EngineConnection>> {
        let Some(path) = bundle.worker_binary.as_ref() else {
            return Err(EngineError::SpawnFailed(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "engine worker binary not found",
            )));
        };
        let engine = WorkerEngine::spawn_with_timeout(path, self.request_timeout).await?;
        Ok(Arc::new(engine))
    }
}

/// Strategy B: embedded engine on the caller's runtime.
pub struct InProcessStrategy;

#[async_trait]
impl EngineStrategy for InProcessStrategy {
    fn name(&self) -> &'static str {
        "in-process"
    }

    async fn connect(&self, _bundle: &Bundle) -> EngineResult<Arc<dyn EngineConnection>> {
        let engine = InProcessEngine::new()?;
        Ok(Arc::new(engine))
    }
}

/// The default strategy order: worker first, in-process fallback.
pub fn default_strategies(settings: &Settings) -> Vec<Arc<dyn EngineStrategy>> {
    vec![
        Arc::new(WorkerStrategy::new(Duration::from_secs(
            settings.engine.request_timeout_secs,
        ))),
        Arc::new(InProcessStrategy),
    ]
}

impl SessionContext {
    /// Acquire the session's engine runtime, initializing it on first use.
    ///
    /// Idempotent: once a runtime is cached every later call returns the
    /// same handle without touching the strategies. The slot's lock is held
    /// across the whole initialization, so concurrent first callers all
    /// observe the single in-flight attempt. On total failure nothing is
    /// cached and the next call retries from scratch.
    pub async fn acquire_runtime(&self) -> SessionResult<Arc<RuntimeHandle>> {
        let mut slot = self.runtime.lock().await;
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        self.set_status(EngineStatus::Initializing);
        let bundle = select_bundle(&self.settings.engine);
        debug!(local = bundle.local, binary = ?bundle.worker_binary, "engine bundle selected");

        let mut failures = Vec::new();
        for strategy in &self.strategies {
            if strategy.skip(&bundle, &self.settings.engine) {
                debug!(strategy = strategy.name(), "skipping execution strategy");
                continue;
            }
            match strategy.connect(&bundle).await {
                Ok(connection) => {
                    info!(strategy = strategy.name(), "query engine ready");
                    let handle = Arc::new(RuntimeHandle::new(connection));
                    self.ensure_capability(&handle).await;
                    *slot = Some(handle.clone());
                    self.set_status(EngineStatus::Ready);
                    return Ok(handle);
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "execution strategy failed");
                    failures.push(StrategyFailure {
                        strategy: strategy.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.set_status(EngineStatus::Failed);
        Err(SessionError::RuntimeInitialization(AcquisitionFailure(
            failures,
        )))
    }
}
