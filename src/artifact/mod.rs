//! Artifact storage collaborator and artifact resolution.
//!
//! An artifact is a remote-stored dataset record: an opaque id, a manifest
//! with a display name, and a list of contained files. The storage service
//! is consumed through the [`ArtifactStore`] trait so the session layer can
//! be exercised against in-memory stores in tests.

mod resolver;
mod store;

use serde::{Deserialize, Serialize};

pub use resolver::resolve_artifact;
pub use store::{ArtifactStore, ServiceArtifactStore, ARTIFACT_MANAGER_SERVICE};

/// A remote-stored dataset record.
///
/// Immutable once fetched; a later listing may return a structurally
/// different record for the same id, which is treated as a fresh value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Opaque artifact id.
    pub id: String,
    /// Descriptive metadata.
    #[serde(default)]
    pub manifest: ArtifactManifest,
}

/// Artifact metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Human-readable display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared files, as listed by the storage service.
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

impl ArtifactManifest {
    /// Relative paths of the declared files, in listing order.
    pub fn file_paths(&self) -> Vec<&str> {
        self.files.iter().filter_map(FileEntry::path).collect()
    }
}

/// One declared file. The storage service lists files either as plain path
/// strings or as objects carrying a `path` or `name` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileEntry {
    /// Plain relative path.
    Path(String),
    /// Object form.
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl FileEntry {
    /// The entry's relative path, if it has a usable one.
    pub fn path(&self) -> Option<&str> {
        let path = match self {
            Self::Path(p) => p.as_str(),
            Self::Detailed { path, name } => path.as_deref().or(name.as_deref())?,
        };
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_deserializes_mixed_file_forms() {
        let json = serde_json::json!({
            "id": "a1",
            "manifest": {
                "name": "Demo",
                "files": [
                    "dataset.csv",
                    { "path": "README.md" },
                    { "name": "notes.txt" },
                    { "path": "" }
                ]
            }
        });

        let artifact: ArtifactRef = serde_json::from_value(json).unwrap();
        assert_eq!(artifact.id, "a1");
        assert_eq!(artifact.manifest.name.as_deref(), Some("Demo"));
        assert_eq!(
            artifact.manifest.file_paths(),
            vec!["dataset.csv", "README.md", "notes.txt"]
        );
    }

    #[test]
    fn test_manifest_defaults_when_absent() {
        let artifact: ArtifactRef = serde_json::from_value(serde_json::json!({"id": "a2"})).unwrap();
        assert!(artifact.manifest.name.is_none());
        assert!(artifact.manifest.file_paths().is_empty());
    }
}
