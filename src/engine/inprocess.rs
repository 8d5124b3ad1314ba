//! In-process (in-thread) fallback engine.
//!
//! Used when the isolated worker strategy is unavailable or fails. Backed by
//! an embedded SQLite database; queries run on the blocking thread pool so
//! the session's async tasks are never stalled by engine work.
//!
//! Extension operations are not supported here: the capability loader treats
//! that as a tolerated install failure, and remote-file reads later fail with
//! a clear error instead of a silent hang.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::error::{EngineError, EngineResult};
use super::{EngineConnection, ExecutionStrategy, TabularResult};

/// Engine connection backed by an embedded SQLite database.
pub struct InProcessEngine {
    conn: Arc<Mutex<Connection>>,
}

impl InProcessEngine {
    /// Open a fresh in-memory engine.
    pub fn new() -> EngineResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| EngineError::Sql(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Execute one SQL statement against the connection.
///
/// Statements without result columns (DDL, DML) return an empty result;
/// everything else returns the full row set.
fn run_sql(conn: &Connection, sql: &str) -> EngineResult<TabularResult> {
    // A single trailing semicolon is tolerated; SQLite's prepare is not.
    let sql = sql.trim().trim_end_matches(';');

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| EngineError::Sql(e.to_string()))?;

    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    if columns.is_empty() {
        stmt.execute([]).map_err(|e| EngineError::Sql(e.to_string()))?;
        return Ok(TabularResult::empty());
    }

    let mut positional = Vec::new();
    let mut rows = stmt
        .query([])
        .map_err(|e| EngineError::Sql(e.to_string()))?;
    while let Some(row) = rows.next().map_err(|e| EngineError::Sql(e.to_string()))? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            let cell = row
                .get_ref(i)
                .map_err(|e| EngineError::Sql(e.to_string()))?;
            cells.push(to_json(cell));
        }
        positional.push(cells);
    }

    Ok(TabularResult::from_positional(columns, positional))
}

/// Convert an engine cell value to a plain JSON scalar.
fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(STANDARD.encode(b)),
    }
}

#[async_trait]
impl EngineConnection for InProcessEngine {
    async fn query(&self, sql: &str) -> EngineResult<TabularResult> {
        let conn = self.conn.clone();
        let sql = sql.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            run_sql(&conn, &sql)
        })
        .await
        .map_err(|_| EngineError::ChannelClosed)?
    }

    async fn install_extension(&self, name: &str) -> EngineResult<()> {
        Err(EngineError::ExtensionUnsupported(name.to_string()))
    }

    async fn load_extension(&self, name: &str) -> EngineResult<()> {
        Err(EngineError::ExtensionUnsupported(name.to_string()))
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::InProcess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_round_trip() {
        let engine = InProcessEngine::new().unwrap();

        engine
            .query("CREATE TABLE t (id INTEGER, name TEXT)")
            .await
            .unwrap();
        engine
            .query("INSERT INTO t VALUES (1, 'alpha'), (2, 'beta')")
            .await
            .unwrap();

        let result = engine.query("SELECT id, name FROM t ORDER BY id;").await.unwrap();
        assert_eq!(result.columns, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[0]["id"], serde_json::json!(1));
        assert_eq!(result.rows[1]["name"], serde_json::json!("beta"));
    }

    #[tokio::test]
    async fn test_zero_rows_keep_columns() {
        let engine = InProcessEngine::new().unwrap();
        engine.query("CREATE TABLE t (id INTEGER)").await.unwrap();

        let result = engine.query("SELECT * FROM t WHERE 1=0").await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["id".to_string()]);
    }

    #[tokio::test]
    async fn test_sql_error_is_surfaced() {
        let engine = InProcessEngine::new().unwrap();
        let err = engine.query("SELECT * FROM missing").await.unwrap_err();
        match err {
            EngineError::Sql(message) => assert!(message.contains("missing")),
            other => panic!("expected Sql error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extensions_unsupported() {
        let engine = InProcessEngine::new().unwrap();
        assert!(matches!(
            engine.install_extension("httpfs").await,
            Err(EngineError::ExtensionUnsupported(_))
        ));
        assert_eq!(engine.strategy(), ExecutionStrategy::InProcess);
    }

    #[tokio::test]
    async fn test_null_and_real_values() {
        let engine = InProcessEngine::new().unwrap();
        let result = engine
            .query("SELECT NULL AS a, 1.5 AS b")
            .await
            .unwrap();
        assert_eq!(result.rows[0]["a"], serde_json::Value::Null);
        assert_eq!(result.rows[0]["b"], serde_json::json!(1.5));
    }
}
