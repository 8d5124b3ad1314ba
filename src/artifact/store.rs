//! ArtifactStore trait and the RPC-backed implementation.

use async_trait::async_trait;

use super::ArtifactRef;
use crate::rpc::{RpcError, RpcResult, ServiceProxy};

/// Well-known id of the remote artifact manager service.
pub const ARTIFACT_MANAGER_SERVICE: &str = "public/artifact-manager";

/// The artifact storage collaborator boundary.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// List artifacts within a parent collection scope.
    async fn list(&self, parent: &str) -> RpcResult<Vec<ArtifactRef>>;

    /// Obtain a time-limited direct-access URL for a file in an artifact.
    async fn get_file(&self, artifact_id: &str, path: &str) -> RpcResult<String>;

    /// Fetch a file's text content.
    ///
    /// Default implementation obtains a direct-access URL and reads it over
    /// HTTP.
    async fn read_file(&self, artifact_id: &str, path: &str) -> RpcResult<String> {
        let url = self.get_file(artifact_id, path).await?;
        let response = reqwest::get(&url)
            .await
            .map_err(|e| RpcError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| RpcError::Http(format!("failed to fetch {path}: {e}")))?;
        response.text().await.map_err(|e| RpcError::Http(e.to_string()))
    }
}

/// [`ArtifactStore`] backed by the remote artifact manager service.
pub struct ServiceArtifactStore {
    proxy: ServiceProxy,
}

impl ServiceArtifactStore {
    /// Wrap a proxy for the artifact manager service.
    pub fn new(proxy: ServiceProxy) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl ArtifactStore for ServiceArtifactStore {
    async fn list(&self, parent: &str) -> RpcResult<Vec<ArtifactRef>> {
        let parent = if parent.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::Value::String(parent.to_string())
        };
        self.proxy
            .call_typed("list", serde_json::json!({ "parent_id": parent }))
            .await
    }

    async fn get_file(&self, artifact_id: &str, path: &str) -> RpcResult<String> {
        self.proxy
            .call_typed(
                "get_file",
                serde_json::json!({ "artifact_id": artifact_id, "file_path": path }),
            )
            .await
    }
}
