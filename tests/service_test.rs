//! Exposed-operation tests against fake collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use quarry::artifact::{ArtifactManifest, ArtifactRef, ArtifactStore, FileEntry};
use quarry::config::Settings;
use quarry::engine::{
    Bundle, EngineConnection, EngineResult, ExecutionStrategy, TabularResult,
};
use quarry::rpc::{RpcError, RpcResult};
use quarry::service::{self, ops};
use quarry::session::{EngineStrategy, SessionContext, SessionError};

// ============================================================================
// Fakes
// ============================================================================

struct FakeConnection {
    queries: Mutex<Vec<String>>,
}

impl FakeConnection {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            queries: Mutex::new(Vec::new()),
        })
    }

    fn recorded_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EngineConnection for FakeConnection {
    async fn query(&self, sql: &str) -> EngineResult<TabularResult> {
        self.queries.lock().unwrap().push(sql.to_string());
        Ok(TabularResult {
            columns: vec!["value".to_string()],
            rows: vec![],
        })
    }

    async fn install_extension(&self, _name: &str) -> EngineResult<()> {
        Ok(())
    }

    async fn load_extension(&self, _name: &str) -> EngineResult<()> {
        Ok(())
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::InProcess
    }
}

struct FakeStrategy {
    connects: AtomicUsize,
    connection: Arc<FakeConnection>,
}

impl FakeStrategy {
    fn new(connection: Arc<FakeConnection>) -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            connection,
        })
    }
}

#[async_trait]
impl EngineStrategy for FakeStrategy {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn connect(&self, _bundle: &Bundle) -> EngineResult<Arc<dyn EngineConnection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.connection.clone())
    }
}

#[derive(Default)]
struct FakeStore {
    artifacts: Vec<ArtifactRef>,
    /// (artifact id, path) to direct-access URL.
    files: HashMap<(String, String), String>,
    /// (artifact id, path) to text content.
    contents: HashMap<(String, String), String>,
    list_calls: AtomicUsize,
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn list(&self, _parent: &str) -> RpcResult<Vec<ArtifactRef>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.artifacts.clone())
    }

    async fn get_file(&self, artifact_id: &str, path: &str) -> RpcResult<String> {
        self.files
            .get(&(artifact_id.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| RpcError::Http(format!("file not found: {path}")))
    }

    async fn read_file(&self, artifact_id: &str, path: &str) -> RpcResult<String> {
        self.contents
            .get(&(artifact_id.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| RpcError::Http(format!("file not found: {path}")))
    }
}

fn demo_artifact() -> ArtifactRef {
    ArtifactRef {
        id: "a1".to_string(),
        manifest: ArtifactManifest {
            name: Some("Demo Dataset".to_string()),
            files: vec![FileEntry::Path("dataset.csv".to_string())],
        },
    }
}

struct Fixture {
    session: Arc<SessionContext>,
    store: Arc<dyn ArtifactStore>,
    connection: Arc<FakeConnection>,
    strategy: Arc<FakeStrategy>,
}

fn fixture(store: FakeStore) -> Fixture {
    let connection = FakeConnection::new();
    let strategy = FakeStrategy::new(connection.clone());
    let session = Arc::new(SessionContext::with_strategies(
        Settings::default(),
        vec![strategy.clone()],
    ));
    Fixture {
        session,
        store: Arc::new(store),
        connection,
        strategy,
    }
}

fn store_with_dataset() -> FakeStore {
    let mut store = FakeStore {
        artifacts: vec![demo_artifact()],
        ..Default::default()
    };
    store.files.insert(
        ("a1".to_string(), "dataset.csv".to_string()),
        "https://files.example.org/a1/dataset.csv".to_string(),
    );
    store
}

// ============================================================================
// Operations
// ============================================================================

#[tokio::test]
async fn test_query_op_binds_then_executes() {
    let fx = fixture(store_with_dataset());

    let result = ops::query(&fx.session, &fx.store, "Demo Dataset", "SELECT * FROM dataset")
        .await
        .unwrap();
    assert_eq!(result.columns, vec!["value"]);

    let queries = fx.connection.recorded_queries();
    assert_eq!(queries.len(), 3);
    assert_eq!(queries[0], "DROP VIEW IF EXISTS dataset;");
    assert!(queries[1].contains("read_csv_auto('https://files.example.org/a1/dataset.csv'"));
    assert_eq!(queries[2], "SELECT * FROM dataset");
}

#[tokio::test]
async fn test_query_op_blank_sql_short_circuits() {
    let store = store_with_dataset();
    let fx = fixture(store);

    let result = ops::query(&fx.session, &fx.store, "a1", "   ").await.unwrap();
    assert_eq!(result, TabularResult::empty());

    // Neither resolution nor the engine was touched.
    assert_eq!(fx.strategy.connects.load(Ordering::SeqCst), 0);
    assert!(fx.connection.recorded_queries().is_empty());
}

#[tokio::test]
async fn test_query_op_unknown_artifact() {
    let fx = fixture(store_with_dataset());

    let err = ops::query(&fx.session, &fx.store, "nope", "SELECT 1")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ArtifactNotFound(_)));
}

#[tokio::test]
async fn test_schema_op_introspects_after_binding() {
    let fx = fixture(store_with_dataset());

    ops::get_schema(&fx.session, &fx.store, "a1").await.unwrap();

    let queries = fx.connection.recorded_queries();
    assert_eq!(queries.last().map(String::as_str), Some("PRAGMA table_info(dataset);"));
}

#[tokio::test]
async fn test_docs_op_returns_file_content() {
    let mut store = store_with_dataset();
    store.contents.insert(
        ("a1".to_string(), "README.md".to_string()),
        "# Demo\nColumns: id, name".to_string(),
    );
    let fx = fixture(store);

    let docs = ops::get_docs(&fx.session, &fx.store, "a1").await.unwrap();
    assert_eq!(docs, "# Demo\nColumns: id, name");
}

#[tokio::test]
async fn test_docs_op_degrades_to_empty_string() {
    // Artifact resolves, but it has no documentation file.
    let fx = fixture(store_with_dataset());

    let docs = ops::get_docs(&fx.session, &fx.store, "a1").await.unwrap();
    assert_eq!(docs, "");
}

#[tokio::test]
async fn test_docs_op_unknown_artifact_is_an_error() {
    let fx = fixture(store_with_dataset());

    let err = ops::get_docs(&fx.session, &fx.store, "nope").await.unwrap_err();
    assert!(matches!(err, SessionError::ArtifactNotFound(_)));
}

// ============================================================================
// Handlers and registration
// ============================================================================

#[tokio::test]
async fn test_handlers_cover_every_descriptor_function() {
    let fx = fixture(store_with_dataset());

    let descriptor = service::descriptor(&fx.session.settings().service);
    let handlers = service::handlers(fx.session.clone(), fx.store.clone());

    let declared: Vec<&str> = descriptor.functions.iter().map(|f| f.name.as_str()).collect();
    let installed: Vec<&str> = handlers.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(declared, installed);
}

#[tokio::test]
async fn test_query_handler_round_trips_json() {
    let fx = fixture(store_with_dataset());
    let handlers = service::handlers(fx.session.clone(), fx.store.clone());
    let (_, query_handler) = handlers
        .into_iter()
        .find(|(name, _)| name == "query")
        .unwrap();

    let result = query_handler(serde_json::json!({
        "artifact": "a1",
        "sql": "SELECT * FROM dataset"
    }))
    .await
    .unwrap();

    assert_eq!(result["columns"], serde_json::json!(["value"]));
    assert_eq!(result["rows"], serde_json::json!([]));
}

#[tokio::test]
async fn test_query_handler_rejects_malformed_params() {
    let fx = fixture(store_with_dataset());
    let handlers = service::handlers(fx.session.clone(), fx.store.clone());
    let (_, query_handler) = handlers
        .into_iter()
        .find(|(name, _)| name == "query")
        .unwrap();

    let err = query_handler(serde_json::json!({ "sql": "SELECT 1" }))
        .await
        .unwrap_err();
    assert!(err.contains("artifact"));
}

#[test]
fn test_registration_claim_is_one_shot() {
    let session = SessionContext::new(Settings::default());

    assert!(!session.is_service_registered());
    assert!(session.begin_service_registration());
    assert!(!session.begin_service_registration());
    assert!(session.is_service_registered());

    // A failed registration releases the claim for a retry.
    session.abort_service_registration();
    assert!(session.begin_service_registration());
}
