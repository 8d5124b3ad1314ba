//! TOML-based configuration for Quarry.
//!
//! Supports a config file (quarry.toml) with environment variable expansion.
//! Every field has a default so the binary runs with no config file at all.
//!
//! Example configuration:
//! ```toml
//! [server]
//! url = "https://hypha.aicell.io"
//! workspace = "hypha-agents"
//! token = "${QUARRY_TOKEN}"
//! method_timeout_secs = 20
//!
//! [artifacts]
//! collection = "biomni-dataset-collection"
//!
//! [service]
//! id = "quarry-sql-worker"
//! visibility = "protected"
//!
//! [engine]
//! local_dir = "./engine"
//! dev_mode = false
//! request_timeout_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// RPC server connection settings.
    pub server: ServerSettings,

    /// Artifact storage settings.
    pub artifacts: ArtifactSettings,

    /// Exposed service settings.
    pub service: ServiceSettings,

    /// Query engine settings.
    pub engine: EngineSettings,
}

/// RPC server connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server URL (http(s) scheme, rewritten to ws(s) for the transport).
    pub url: String,

    /// Workspace to connect to.
    pub workspace: String,

    /// Authentication token (supports ${ENV_VAR} expansion).
    /// When absent, a cached or freshly acquired token is used instead.
    pub token: Option<String>,

    /// Timeout for a single RPC method call, in seconds.
    pub method_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "https://hypha.aicell.io".to_string(),
            workspace: "hypha-agents".to_string(),
            token: None,
            method_timeout_secs: 20,
        }
    }
}

impl ServerSettings {
    /// Get the token with environment variables expanded.
    pub fn resolved_token(&self) -> Result<Option<String>, SettingsError> {
        self.token.as_deref().map(expand_env_vars).transpose()
    }
}

/// Artifact storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Parent collection artifacts are listed from.
    pub collection: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            collection: "biomni-dataset-collection".to_string(),
        }
    }
}

/// Exposed service settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Stable service id the operations are registered under.
    pub id: String,

    /// Human-readable service name.
    pub name: String,

    /// Service description.
    pub description: String,

    /// Visibility level ("public" or "protected").
    pub visibility: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            id: "quarry-sql-worker".to_string(),
            name: "Quarry SQL Worker".to_string(),
            description: "Run SQL against remote artifact datasets".to_string(),
            visibility: "protected".to_string(),
        }
    }
}

/// Query engine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Explicit path to the engine worker binary.
    pub path: Option<String>,

    /// Directory probed for a locally hosted worker binary.
    pub local_dir: Option<String>,

    /// Local development session: skip the worker strategy unless a
    /// locally hosted binary is present.
    pub dev_mode: bool,

    /// Timeout for a single engine request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            path: None,
            local_dir: None,
            dev_mode: false,
            request_timeout_secs: 30,
        }
    }
}

impl EngineSettings {
    /// Get the configured worker path with environment variables expanded.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        let path = self.path.as_deref()?;
        let expanded = expand_env_vars(path).ok()?;
        Some(PathBuf::from(expanded))
    }

    /// Directory probed for a locally hosted worker binary.
    pub fn local_bundle_dir(&self) -> PathBuf {
        self.local_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./engine"))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `QUARRY_CONFIG`
    /// 2. `./quarry.toml`
    /// 3. `~/.config/quarry/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        // Check environment variable first
        if let Ok(path) = env::var("QUARRY_CONFIG") {
            return Self::from_file(&path);
        }

        // Check local directory
        let local_config = PathBuf::from("quarry.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("quarry").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            // Check for ${VAR} or $VAR
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("QUARRY_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${QUARRY_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("prefix_${QUARRY_TEST_VAR}_suffix").unwrap(),
            "prefix_hello_suffix"
        );
        env::remove_var("QUARRY_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_no_braces() {
        env::set_var("QUARRY_TEST_VAR2", "world");
        assert_eq!(expand_env_vars("$QUARRY_TEST_VAR2").unwrap(), "world");
        assert_eq!(expand_env_vars("$QUARRY_TEST_VAR2!").unwrap(), "world!");
        env::remove_var("QUARRY_TEST_VAR2");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("${NONEXISTENT_VAR_12345}");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[server]
url = "https://rpc.example.org"
workspace = "lab"
method_timeout_secs = 5

[artifacts]
collection = "my-datasets"

[service]
id = "my-sql-worker"
visibility = "public"

[engine]
dev_mode = true
request_timeout_secs = 10
"#;

        let settings: Settings = toml::from_str(toml).unwrap();

        assert_eq!(settings.server.url, "https://rpc.example.org");
        assert_eq!(settings.server.workspace, "lab");
        assert_eq!(settings.server.method_timeout_secs, 5);
        assert_eq!(settings.artifacts.collection, "my-datasets");
        assert_eq!(settings.service.id, "my-sql-worker");
        assert_eq!(settings.service.visibility, "public");
        assert!(settings.engine.dev_mode);
        assert_eq!(settings.engine.request_timeout_secs, 10);
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.server.url, "https://hypha.aicell.io");
        assert_eq!(settings.server.workspace, "hypha-agents");
        assert!(settings.server.token.is_none());
        assert_eq!(settings.server.method_timeout_secs, 20);
        assert_eq!(settings.artifacts.collection, "biomni-dataset-collection");
        assert_eq!(settings.service.id, "quarry-sql-worker");
        assert_eq!(settings.service.visibility, "protected");
        assert!(!settings.engine.dev_mode);
        assert_eq!(settings.engine.request_timeout_secs, 30);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let settings: Settings = toml::from_str("[server]\nworkspace = \"w\"\n").unwrap();
        assert_eq!(settings.server.workspace, "w");
        assert_eq!(settings.server.url, "https://hypha.aicell.io");
        assert_eq!(settings.service.id, "quarry-sql-worker");
    }

    #[test]
    fn test_local_bundle_dir_default() {
        let engine = EngineSettings::default();
        assert_eq!(engine.local_bundle_dir(), PathBuf::from("./engine"));

        let engine = EngineSettings {
            local_dir: Some("/opt/quarry/engine".to_string()),
            ..Default::default()
        };
        assert_eq!(engine.local_bundle_dir(), PathBuf::from("/opt/quarry/engine"));
    }
}
