//! Remote procedure call collaborator.
//!
//! One websocket connection per session, established lazily and reused. Our
//! outgoing calls and the server's incoming service invocations share the
//! connection; see [`client`] for the frame routing rules.

pub mod auth;
mod client;
mod error;
pub mod protocol;

pub use client::{HandlerFuture, RpcClient, ServiceHandler, ServiceProxy};
pub use error::{RpcError, RpcResult};
pub use protocol::ServiceDescriptor;
