//! Query and schema entry points over the acquired runtime.

use tracing::debug;

use crate::engine::TabularResult;

use super::binder::TABLE_NAME;
use super::{SessionContext, SessionError, SessionResult};

impl SessionContext {
    /// Execute SQL against the session's engine.
    ///
    /// Blank input (empty or whitespace-only) is a no-op: `Ok(None)` is
    /// returned and the engine is not touched, so a blank call on a cold
    /// session does not trigger runtime acquisition. A result with zero
    /// rows is still `Some`: its column list distinguishes it from a no-op.
    pub async fn run_query(&self, sql: &str) -> SessionResult<Option<TabularResult>> {
        if sql.trim().is_empty() {
            debug!("blank SQL input, skipping execution");
            return Ok(None);
        }
        let handle = self.acquire_runtime().await?;
        let result = handle
            .connection()
            .query(sql)
            .await
            .map_err(SessionError::query)?;
        debug!(
            rows = result.row_count(),
            columns = result.columns.len(),
            "query executed"
        );
        Ok(Some(result))
    }

    /// Introspect the bound table's column structure.
    pub async fn get_schema(&self) -> SessionResult<TabularResult> {
        let handle = self.acquire_runtime().await?;
        handle
            .connection()
            .query(&format!("PRAGMA table_info({TABLE_NAME});"))
            .await
            .map_err(SessionError::query)
    }
}
