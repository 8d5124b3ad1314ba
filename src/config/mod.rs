//! Configuration for Quarry.
//!
//! Settings are read once at startup from a TOML file (with environment
//! variable expansion) and passed down to the session and RPC layers.

mod settings;

pub use settings::{
    expand_env_vars, ArtifactSettings, EngineSettings, ServerSettings, ServiceSettings, Settings,
    SettingsError,
};
