//! Protocol types for engine worker communication.
//!
//! The worker speaks NDJSON over stdin/stdout. Every request carries a
//! correlation id; responses are matched back to their request by id, so
//! requests may be issued concurrently.

use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// Method name (e.g., "query.execute").
    pub method: String,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

/// Response envelope received from the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error information (present if success = false).
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Error information in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Request Parameters
// ============================================================================

/// Parameters for `query.execute`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteQueryParams {
    /// SQL text to execute.
    pub sql: String,
}

/// Parameters for `extension.install` and `extension.load`.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionParams {
    /// Extension name (e.g., "httpfs").
    pub name: String,
}

// ============================================================================
// Response Types
// ============================================================================

/// Response from `query.execute`.
///
/// Rows arrive as positional arrays; the adapter normalizes them into a
/// [`TabularResult`] before anything downstream sees them.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteQueryResponse {
    /// Result column names, in order.
    pub columns: Vec<String>,
    /// Result data rows, positional.
    pub rows: Vec<Vec<serde_json::Value>>,
}

// ============================================================================
// Normalized result
// ============================================================================

/// Normalized tabular query result.
///
/// Produced once at the engine-adapter boundary so downstream code never has
/// to sniff the shape of an engine-specific result object. Zero rows and
/// zero columns are independently representable: a filter that matches
/// nothing keeps its column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    /// Ordered, unique column names.
    pub columns: Vec<String>,
    /// Rows as column-name-to-scalar mappings, in engine order.
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
}

impl TabularResult {
    /// An empty result: no columns, no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from ordered columns and positional rows.
    ///
    /// Cells beyond the column list are dropped; missing cells are omitted
    /// from the row mapping.
    pub fn from_positional(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .cloned()
                    .zip(row)
                    .collect::<serde_json::Map<_, _>>()
            })
            .collect();
        Self { columns, rows }
    }

    /// Number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the result has no rows. Distinct from having no columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Method Names
// ============================================================================

/// Worker method names.
pub mod methods {
    pub const EXECUTE_QUERY: &str = "query.execute";
    pub const INSTALL_EXTENSION: &str = "extension.install";
    pub const LOAD_EXTENSION: &str = "extension.load";
}
