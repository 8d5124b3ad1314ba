//! Async client for the isolated engine worker process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{error, warn};

use super::error::{EngineError, EngineResult};
use super::protocol::{self, methods, RequestEnvelope, ResponseEnvelope};
use super::{EngineConnection, ExecutionStrategy, TabularResult};

/// Default timeout for engine requests (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Engine connection backed by an isolated worker child process.
///
/// The worker is spawned once per session and communicates via NDJSON
/// (newline-delimited JSON) over stdin/stdout. Each request carries a unique
/// id for correlation with responses, enabling concurrent requests.
pub struct WorkerEngine {
    /// Writer for sending requests to worker stdin.
    stdin: Arc<Mutex<BufWriter<ChildStdin>>>,

    /// Map of pending request IDs to response channels.
    pending: Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>,

    /// Handle to the worker child process.
    _child: Child,

    /// Handle to the background reader task.
    _reader_task: tokio::task::JoinHandle<()>,

    /// Request timeout duration.
    timeout: Duration,
}

impl WorkerEngine {
    /// Spawn a new worker process with the default request timeout.
    pub async fn spawn<P: AsRef<Path>>(worker_path: P) -> EngineResult<Self> {
        Self::spawn_with_timeout(worker_path, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
    }

    /// Spawn a new worker process with a custom request timeout.
    pub async fn spawn_with_timeout<P: AsRef<Path>>(
        worker_path: P,
        timeout: Duration,
    ) -> EngineResult<Self> {
        let mut child = Command::new(worker_path.as_ref())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or_else(|| {
            EngineError::SpawnFailed(std::io::Error::other("stdin not captured"))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            EngineError::SpawnFailed(std::io::Error::other("stdout not captured"))
        })?;

        let stdin = Arc::new(Mutex::new(BufWriter::new(stdin)));
        let pending: Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let reader_task = Self::spawn_reader_task(stdout, pending.clone());

        Ok(Self {
            stdin,
            pending,
            _child: child,
            _reader_task: reader_task,
            timeout,
        })
    }

    /// Spawn the background task that reads responses from the worker.
    fn spawn_reader_task(
        stdout: ChildStdout,
        pending: Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        // EOF - worker exited
                        break;
                    }
                    Ok(_) => match serde_json::from_str::<ResponseEnvelope>(&line) {
                        Ok(resp) => {
                            let mut pending = pending.lock().await;
                            if let Some(tx) = pending.remove(&resp.id) {
                                let _ = tx.send(resp);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to parse engine worker response");
                        }
                    },
                    Err(e) => {
                        error!(error = %e, "engine worker read error");
                        break;
                    }
                }
            }

            // Worker exited - notify all pending requests
            let mut pending = pending.lock().await;
            for (id, tx) in pending.drain() {
                let error_response = ResponseEnvelope {
                    id,
                    success: false,
                    result: None,
                    error: Some(protocol::ErrorInfo {
                        code: "WORKER_EXITED".to_string(),
                        message: "Engine worker exited unexpectedly".to_string(),
                    }),
                };
                let _ = tx.send(error_response);
            }
        })
    }

    /// Send a request to the worker and wait for a response.
    pub async fn request<P, R>(&self, method: &str, params: P) -> EngineResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = uuid::Uuid::new_v4().to_string();

        let request = RequestEnvelope {
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params).map_err(EngineError::SerializeFailed)?,
        };

        // Register response channel
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        // Send request
        {
            let mut stdin = self.stdin.lock().await;
            let line =
                serde_json::to_string(&request).map_err(EngineError::SerializeFailed)? + "\n";
            stdin
                .write_all(line.as_bytes())
                .await
                .map_err(EngineError::WriteFailed)?;
            stdin.flush().await.map_err(EngineError::WriteFailed)?;
        }

        // Wait for response with timeout
        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => {
                // Channel closed - worker exited
                return Err(EngineError::ChannelClosed);
            }
            Err(_) => {
                // Timeout - clean up pending request to prevent a leak
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(EngineError::Timeout(self.timeout.as_secs()));
            }
        };

        if response.success {
            let result = response.result.unwrap_or(serde_json::Value::Null);
            serde_json::from_value(result).map_err(EngineError::DeserializeFailed)
        } else {
            let error = response.error.unwrap_or_else(|| protocol::ErrorInfo {
                code: "UNKNOWN".to_string(),
                message: "Unknown error".to_string(),
            });
            Err(Self::classify_error(&error.code, &error.message))
        }
    }

    /// Classify a worker error into a more specific error type.
    fn classify_error(code: &str, message: &str) -> EngineError {
        match code {
            "SQL_ERROR" => EngineError::Sql(message.to_string()),
            "EXTENSION_UNSUPPORTED" => EngineError::ExtensionUnsupported(message.to_string()),
            "WORKER_EXITED" => EngineError::WorkerExited,
            _ => EngineError::remote(code, message),
        }
    }

    /// Check if the worker is still running.
    pub fn is_alive(&self) -> bool {
        !self._reader_task.is_finished()
    }

    /// Get the current request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl EngineConnection for WorkerEngine {
    async fn query(&self, sql: &str) -> EngineResult<TabularResult> {
        let response: protocol::ExecuteQueryResponse = self
            .request(
                methods::EXECUTE_QUERY,
                protocol::ExecuteQueryParams {
                    sql: sql.to_string(),
                },
            )
            .await?;

        Ok(TabularResult::from_positional(
            response.columns,
            response.rows,
        ))
    }

    async fn install_extension(&self, name: &str) -> EngineResult<()> {
        let _: serde_json::Value = self
            .request(
                methods::INSTALL_EXTENSION,
                protocol::ExtensionParams {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    async fn load_extension(&self, name: &str) -> EngineResult<()> {
        let _: serde_json::Value = self
            .request(
                methods::LOAD_EXTENSION,
                protocol::ExtensionParams {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(matches!(
            WorkerEngine::classify_error("SQL_ERROR", "no such table"),
            EngineError::Sql(_)
        ));
        assert!(matches!(
            WorkerEngine::classify_error("EXTENSION_UNSUPPORTED", "httpfs"),
            EngineError::ExtensionUnsupported(_)
        ));
        assert!(matches!(
            WorkerEngine::classify_error("WORKER_EXITED", "gone"),
            EngineError::WorkerExited
        ));
        assert!(matches!(
            WorkerEngine::classify_error("SOMETHING_ELSE", "?"),
            EngineError::Remote { .. }
        ));
    }

    #[test]
    fn test_sql_error_message_is_verbatim() {
        let err = WorkerEngine::classify_error("SQL_ERROR", "Parser Error: syntax error at '1'");
        assert_eq!(err.to_string(), "Parser Error: syntax error at '1'");
    }
}
