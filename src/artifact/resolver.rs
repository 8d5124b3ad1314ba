//! Artifact resolution: map a user-supplied key to an artifact record.

use tracing::warn;

use super::{ArtifactRef, ArtifactStore};
use crate::session::{SessionError, SessionResult};

/// Resolve a key (artifact id, or display name matched case-insensitively)
/// against the listing of a collection.
///
/// An exact id match takes precedence over a name match; within each pass
/// the first hit in listing order wins. A listing failure is a recoverable
/// boundary: it is logged and degraded to an empty listing, so the caller
/// sees `ArtifactNotFound` rather than a transport error. This policy is
/// deliberately confined to listing; file-URL retrieval failures propagate.
pub async fn resolve_artifact(
    store: &dyn ArtifactStore,
    collection: &str,
    key: &str,
) -> SessionResult<ArtifactRef> {
    let key = key.trim();
    if key.is_empty() {
        return Err(SessionError::ArtifactNotFound(
            "artifact key is required".to_string(),
        ));
    }

    let listing = match store.list(collection).await {
        Ok(items) => items,
        Err(e) => {
            warn!(collection, error = %e, "artifact listing failed; treating as empty");
            Vec::new()
        }
    };

    if let Some(hit) = listing.iter().find(|a| a.id == key) {
        return Ok(hit.clone());
    }

    let lowered = key.to_lowercase();
    listing
        .into_iter()
        .find(|a| {
            a.manifest
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase() == lowered)
        })
        .ok_or_else(|| SessionError::ArtifactNotFound(key.to_string()))
}
