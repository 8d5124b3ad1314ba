//! Engine resource bundle selection.
//!
//! A "bundle" is the engine worker binary. Selection has two tiers: a cheap
//! existence probe against a locally hosted copy first, then fallback to the
//! default resolution (explicit config path, conventional locations, PATH).

use std::path::PathBuf;

use crate::config::EngineSettings;

/// Conventional name of the engine worker binary.
pub const WORKER_BINARY_NAME: &str = "quarry-worker";

/// A selected engine resource bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Resolved worker binary, if any tier produced one.
    pub worker_binary: Option<PathBuf>,
    /// True when the binary came from the locally hosted tier.
    pub local: bool,
}

impl Bundle {
    /// A bundle with no worker binary at all.
    pub fn none() -> Self {
        Self {
            worker_binary: None,
            local: false,
        }
    }
}

/// Select the engine bundle for this session.
///
/// Prefers a locally hosted worker binary when the probe succeeds, otherwise
/// falls back to the default resolution. Never fails: an empty bundle simply
/// means the worker strategy will fail and the in-process strategy takes
/// over.
pub fn select_bundle(engine: &EngineSettings) -> Bundle {
    let local_candidate = engine.local_bundle_dir().join(WORKER_BINARY_NAME);
    if local_candidate.is_file() {
        return Bundle {
            worker_binary: Some(local_candidate),
            local: true,
        };
    }

    Bundle {
        worker_binary: default_resolution(engine),
        local: false,
    }
}

/// Default (non-local) worker binary resolution.
fn default_resolution(engine: &EngineSettings) -> Option<PathBuf> {
    // Explicit config path wins
    if let Some(path) = engine.resolved_path() {
        return Some(path);
    }

    // Search conventional locations
    let candidates = [
        WORKER_BINARY_NAME,
        "./quarry-worker",
        "./worker/quarry-worker",
    ];

    for candidate in candidates {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    // Try PATH
    if let Ok(output) = std::process::Command::new("which")
        .arg(WORKER_BINARY_NAME)
        .output()
    {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_local_probe_miss_is_not_local() {
        let engine = EngineSettings {
            local_dir: Some("/nonexistent/quarry-test-dir".to_string()),
            ..Default::default()
        };
        let bundle = select_bundle(&engine);
        assert!(!bundle.local);
    }

    #[test]
    fn test_local_probe_hit() {
        let dir = std::env::temp_dir().join("quarry-bundle-test");
        fs::create_dir_all(&dir).unwrap();
        let binary = dir.join(WORKER_BINARY_NAME);
        fs::write(&binary, b"").unwrap();

        let engine = EngineSettings {
            local_dir: Some(dir.to_string_lossy().into_owned()),
            ..Default::default()
        };
        let bundle = select_bundle(&engine);
        assert!(bundle.local);
        assert_eq!(bundle.worker_binary, Some(binary.clone()));

        fs::remove_file(&binary).ok();
    }

    #[test]
    fn test_explicit_path_used_in_default_tier() {
        let engine = EngineSettings {
            local_dir: Some("/nonexistent/quarry-test-dir".to_string()),
            path: Some("/opt/quarry/quarry-worker".to_string()),
            ..Default::default()
        };
        let bundle = select_bundle(&engine);
        assert!(!bundle.local);
        assert_eq!(
            bundle.worker_binary,
            Some(PathBuf::from("/opt/quarry/quarry-worker"))
        );
    }
}
