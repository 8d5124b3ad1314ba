//! Dataset binding: expose an artifact's dataset file under a fixed table
//! name.

use tracing::{debug, info};

use crate::artifact::{ArtifactRef, ArtifactStore};

use super::{SessionContext, SessionError, SessionResult};

/// Fixed logical table name every bound dataset is exposed as.
pub const TABLE_NAME: &str = "dataset";

/// Filename tried first inside an artifact.
pub const DEFAULT_DATASET_FILE: &str = "dataset.csv";

/// Extension a fallback dataset file must carry (matched case-insensitively).
pub const DATASET_EXTENSION: &str = ".csv";

/// Conventional documentation filename inside an artifact.
pub const DOCS_FILE: &str = "README.md";

/// The currently bound dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundTable {
    /// Logical table name (always [`TABLE_NAME`]).
    pub logical_name: String,
    /// Direct-access URL the view reads from.
    pub source_url: String,
    /// Artifact the dataset came from.
    pub artifact_id: String,
}

impl SessionContext {
    /// Bind an artifact's dataset file as the session's `dataset` view.
    ///
    /// Replaces any previous binding: the old view is dropped and the new
    /// one created while the binding lock is held, so concurrent queries
    /// never observe a half-replaced binding record. Rebinding the same
    /// artifact goes through the full drop-and-create cycle so a fresh
    /// direct-access URL is picked up.
    pub async fn bind_artifact(
        &self,
        store: &dyn ArtifactStore,
        artifact: &ArtifactRef,
    ) -> SessionResult<BoundTable> {
        let url = resolve_dataset_url(store, artifact).await?;
        let handle = self.acquire_runtime().await?;

        let mut binding = self.binding.lock().await;
        let conn = handle.connection();
        conn.query(&format!("DROP VIEW IF EXISTS {TABLE_NAME};"))
            .await
            .map_err(SessionError::query)?;
        conn.query(&format!(
            "CREATE VIEW {TABLE_NAME} AS SELECT * FROM read_csv_auto('{}', HEADER=TRUE);",
            url.replace('\'', "''")
        ))
        .await
        .map_err(SessionError::query)?;

        let bound = BoundTable {
            logical_name: TABLE_NAME.to_string(),
            source_url: url,
            artifact_id: artifact.id.clone(),
        };
        *binding = Some(bound.clone());
        info!(artifact = %artifact.id, table = TABLE_NAME, "dataset bound");
        Ok(bound)
    }
}

/// Resolve the direct-access URL of an artifact's dataset file.
///
/// Tries the conventional `dataset.csv` first; when that fails, scans the
/// manifest for the first file with the dataset extension. The error for a
/// fully unresolvable artifact carries the original default-filename
/// failure, which is the more diagnostic of the two.
async fn resolve_dataset_url(
    store: &dyn ArtifactStore,
    artifact: &ArtifactRef,
) -> SessionResult<String> {
    match store.get_file(&artifact.id, DEFAULT_DATASET_FILE).await {
        Ok(url) => Ok(url),
        Err(original) => {
            let fallback = artifact
                .manifest
                .file_paths()
                .into_iter()
                .find(|p| p.to_lowercase().ends_with(DATASET_EXTENSION));
            match fallback {
                Some(path) => {
                    debug!(artifact = %artifact.id, path, "default dataset file missing; using fallback");
                    Ok(store.get_file(&artifact.id, path).await?)
                }
                None => Err(SessionError::DatasetFileNotFound {
                    artifact: artifact.id.clone(),
                    message: original.to_string(),
                }),
            }
        }
    }
}
