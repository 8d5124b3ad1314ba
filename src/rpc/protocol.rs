//! Frame and contract types for the RPC connection.
//!
//! Frames are JSON text messages over the websocket. Outgoing calls and
//! incoming service invocations share the same envelope shape: a frame with
//! a `method` is a request, a frame without one is a reply to a pending
//! request.

use serde::{Deserialize, Serialize};

// ============================================================================
// Frames
// ============================================================================

/// Request frame (sent for our calls, received for service invocations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Unique request ID for correlation.
    pub id: String,
    /// Fully qualified method name (e.g., "quarry-sql-worker.query").
    pub method: String,
    /// Method-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response frame (received for our calls, sent for service invocations).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error information (present if success = false).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl ResponseFrame {
    /// Build a success response.
    pub fn ok(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    pub fn err(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(ErrorInfo {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Error information in a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// A parsed incoming frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// A service invocation addressed to us.
    Request(RequestFrame),
    /// A reply to one of our pending calls.
    Response(ResponseFrame),
}

impl Frame {
    /// Classify a raw JSON text message.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if value.get("method").is_some() {
            Ok(Self::Request(serde_json::from_value(value)?))
        } else {
            Ok(Self::Response(serde_json::from_value(value)?))
        }
    }
}

// ============================================================================
// Service descriptor (the produced contract)
// ============================================================================

/// Descriptor for a service registered with the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// Stable external service id.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Description of what the service does.
    pub description: String,
    /// Service configuration.
    pub config: ServiceConfig,
    /// Operations the service exposes.
    pub functions: Vec<FunctionDescriptor>,
}

/// Service-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Visibility level ("public" or "protected").
    pub visibility: String,
}

/// One exposed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    /// Operation name.
    pub name: String,
    /// Short documentation string.
    pub docs: String,
    /// Declared parameters.
    pub params: Vec<ParamDescriptor>,
    /// Declared return type.
    pub returns: ReturnDescriptor,
}

/// A declared parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDescriptor {
    /// Parameter name.
    pub name: String,
    /// Parameter type ("string").
    #[serde(rename = "type")]
    pub param_type: String,
}

/// A declared return type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnDescriptor {
    /// Return type ("string" or "object").
    #[serde(rename = "type")]
    pub return_type: String,
}

/// Server acknowledgement of a service registration.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationInfo {
    /// Id the service was registered under.
    pub id: String,
}

// ============================================================================
// Login flow
// ============================================================================

/// Response from the login service's `start` operation.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInfo {
    /// URL the user completes the login at.
    pub login_url: String,
    /// Key used to poll for the issued token.
    pub key: String,
}
