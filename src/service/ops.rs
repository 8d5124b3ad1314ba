//! The exposed operations, as plain async functions.
//!
//! Handlers in `service::mod` are thin JSON adapters over these, so tests
//! can exercise the operation semantics directly with fake collaborators.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::artifact::{resolve_artifact, ArtifactStore};
use crate::engine::TabularResult;
use crate::session::{SessionContext, SessionResult, DOCS_FILE};

/// Run SQL against an artifact's dataset.
///
/// Resolves and binds the artifact, then executes. Blank SQL short-circuits
/// to an empty result without binding or touching the engine.
pub async fn query(
    session: &Arc<SessionContext>,
    store: &Arc<dyn ArtifactStore>,
    artifact_key: &str,
    sql: &str,
) -> SessionResult<TabularResult> {
    if sql.trim().is_empty() {
        debug!("blank SQL in query operation, returning empty result");
        return Ok(TabularResult::empty());
    }

    let collection = &session.settings().artifacts.collection;
    let artifact = resolve_artifact(store.as_ref(), collection, artifact_key).await?;
    session.bind_artifact(store.as_ref(), &artifact).await?;

    match session.run_query(sql).await? {
        Some(result) => Ok(result),
        // Unreachable for non-blank SQL, but keep the contract total.
        None => Ok(TabularResult::empty()),
    }
}

/// Introspect the column structure of an artifact's dataset.
pub async fn get_schema(
    session: &Arc<SessionContext>,
    store: &Arc<dyn ArtifactStore>,
    artifact_key: &str,
) -> SessionResult<TabularResult> {
    let collection = &session.settings().artifacts.collection;
    let artifact = resolve_artifact(store.as_ref(), collection, artifact_key).await?;
    session.bind_artifact(store.as_ref(), &artifact).await?;
    session.get_schema().await
}

/// Fetch an artifact's documentation file.
///
/// Best-effort: a missing or unreadable file degrades to an empty string.
/// Only an unresolvable artifact key is an error.
pub async fn get_docs(
    session: &Arc<SessionContext>,
    store: &Arc<dyn ArtifactStore>,
    artifact_key: &str,
) -> SessionResult<String> {
    let collection = &session.settings().artifacts.collection;
    let artifact = resolve_artifact(store.as_ref(), collection, artifact_key).await?;

    match store.read_file(&artifact.id, DOCS_FILE).await {
        Ok(content) => Ok(content),
        Err(e) => {
            warn!(artifact = %artifact.id, error = %e, "documentation unavailable");
            Ok(String::new())
        }
    }
}
