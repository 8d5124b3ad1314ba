//! Quarry: SQL over remote artifact datasets.
//!
//! Quarry binds tabular dataset files stored as remote artifacts to a local
//! query engine and exposes query, schema-introspection, and documentation
//! operations as a registered RPC service.
//!
//! # Architecture
//!
//! ```text
//! RPC server (websocket)
//!       |
//!   rpc::RpcClient  <--- service::register_session_service
//!       |                        |
//!   artifact::ArtifactStore   session::SessionContext
//!       |                        |
//!   (remote artifact files)   engine::EngineConnection
//!                                |
//!                  WorkerEngine (child process, NDJSON)
//!                  InProcessEngine (embedded fallback)
//! ```
//!
//! The session layer is the core: it lazily acquires an engine runtime
//! (worker strategy first, in-process fallback), installs the remote-file
//! streaming capability once, and binds each requested artifact's dataset
//! file as a fixed `dataset` view that the exposed operations query.

pub mod artifact;
pub mod config;
pub mod engine;
pub mod rpc;
pub mod service;
pub mod session;

pub use artifact::{resolve_artifact, ArtifactRef, ArtifactStore, ServiceArtifactStore};
pub use config::Settings;
pub use engine::{EngineConnection, TabularResult};
pub use rpc::RpcClient;
pub use session::{EngineStatus, SessionContext, SessionError, SessionResult};
