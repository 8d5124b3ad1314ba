//! Session state and lifecycle.
//!
//! A [`SessionContext`] is the long-lived object behind the exposed service:
//! it owns the (lazily acquired) engine runtime, the one-shot capability
//! state, the current table binding, and the status channel observers watch.
//!
//! Concurrency model: each mutable slot sits behind its own async mutex.
//! Runtime acquisition holds the runtime slot's lock for the whole
//! initialization, so concurrent callers queue up behind the in-flight
//! attempt and observe its outcome instead of racing their own.

mod binder;
mod capability;
mod error;
mod facade;
mod runtime;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::config::Settings;

use capability::CapabilityState;

pub use binder::{BoundTable, DATASET_EXTENSION, DEFAULT_DATASET_FILE, DOCS_FILE, TABLE_NAME};
pub use capability::STREAMING_EXTENSION;
pub use error::{AcquisitionFailure, SessionError, SessionResult, StrategyFailure};
pub use runtime::{
    default_strategies, EngineStatus, EngineStrategy, InProcessStrategy, RuntimeHandle,
    WorkerStrategy,
};

/// Long-lived session state.
pub struct SessionContext {
    settings: Settings,
    strategies: Vec<Arc<dyn EngineStrategy>>,
    runtime: Mutex<Option<Arc<RuntimeHandle>>>,
    capability: Mutex<CapabilityState>,
    binding: Mutex<Option<BoundTable>>,
    status_tx: watch::Sender<EngineStatus>,
    service_registered: AtomicBool,
}

impl SessionContext {
    /// Create a session with the default strategy order (worker first,
    /// in-process fallback).
    pub fn new(settings: Settings) -> Self {
        let strategies = default_strategies(&settings);
        Self::with_strategies(settings, strategies)
    }

    /// Create a session with an explicit strategy list, tried in order.
    pub fn with_strategies(settings: Settings, strategies: Vec<Arc<dyn EngineStrategy>>) -> Self {
        let (status_tx, _) = watch::channel(EngineStatus::Idle);
        Self {
            settings,
            strategies,
            runtime: Mutex::new(None),
            capability: Mutex::new(CapabilityState::default()),
            binding: Mutex::new(None),
            status_tx,
            service_registered: AtomicBool::new(false),
        }
    }

    /// The session's configuration.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Subscribe to engine status transitions.
    pub fn status(&self) -> watch::Receiver<EngineStatus> {
        self.status_tx.subscribe()
    }

    /// The current engine status.
    pub fn current_status(&self) -> EngineStatus {
        *self.status_tx.borrow()
    }

    pub(crate) fn set_status(&self, status: EngineStatus) {
        self.status_tx.send_replace(status);
    }

    /// The currently bound table, if an artifact has been bound.
    pub async fn current_binding(&self) -> Option<BoundTable> {
        self.binding.lock().await.clone()
    }

    /// Claim service registration. Returns true exactly once per session;
    /// later calls see the flag already set and skip re-registering.
    pub fn begin_service_registration(&self) -> bool {
        self.service_registered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release a registration claim after the registration call failed, so
    /// a later attempt can retry.
    pub fn abort_service_registration(&self) {
        self.service_registered.store(false, Ordering::SeqCst);
    }

    /// Whether the service has been registered for this session.
    pub fn is_service_registered(&self) -> bool {
        self.service_registered.load(Ordering::SeqCst)
    }
}
