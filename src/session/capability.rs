//! One-shot installation of the remote-file streaming capability.

use tracing::{info, warn};

use super::runtime::RuntimeHandle;
use super::{SessionContext, SessionError};

/// Engine extension that lets views read files over HTTP(S).
pub const STREAMING_EXTENSION: &str = "httpfs";

/// Per-session capability state. `attempted` is monotonic: installation is
/// tried at most once, whatever the outcome.
#[derive(Debug, Default)]
pub(crate) struct CapabilityState {
    attempted: bool,
    installed: bool,
}

impl SessionContext {
    /// Install and load the streaming extension, once per session.
    ///
    /// Best-effort: a failure is logged and the session continues without
    /// the capability. Queries that depend on it fail at execution time
    /// with the engine's own message.
    pub(crate) async fn ensure_capability(&self, handle: &RuntimeHandle) {
        let mut state = self.capability.lock().await;
        if state.attempted {
            return;
        }
        state.attempted = true;

        match install(handle).await {
            Ok(()) => {
                state.installed = true;
                info!(
                    extension = STREAMING_EXTENSION,
                    "remote-file streaming capability installed"
                );
            }
            Err(e) => {
                warn!(error = %e, "remote-file streaming capability unavailable");
            }
        }
    }

    /// Whether the streaming capability ended up installed.
    pub async fn capability_installed(&self) -> bool {
        self.capability.lock().await.installed
    }
}

async fn install(handle: &RuntimeHandle) -> Result<(), SessionError> {
    let wrap = |e: crate::engine::EngineError| SessionError::CapabilityInstall {
        name: STREAMING_EXTENSION.to_string(),
        message: e.to_string(),
    };
    let conn = handle.connection();
    conn.install_extension(STREAMING_EXTENSION).await.map_err(wrap)?;
    conn.load_extension(STREAMING_EXTENSION).await.map_err(wrap)?;
    Ok(())
}
