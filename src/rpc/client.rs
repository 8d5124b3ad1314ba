//! Async websocket client for the RPC server.
//!
//! The connection is full duplex: our own calls go out as request frames and
//! are matched to reply frames by correlation id, while request frames
//! arriving from the server are invocations of operations we registered and
//! are dispatched to local handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::error::{RpcError, RpcResult};
use super::protocol::{
    ErrorInfo, Frame, RegistrationInfo, RequestFrame, ResponseFrame, ServiceDescriptor,
};
use crate::config::Settings;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Future returned by a service handler.
pub type HandlerFuture = futures::future::BoxFuture<'static, Result<serde_json::Value, String>>;

/// A locally registered operation handler.
pub type ServiceHandler = Arc<dyn Fn(serde_json::Value) -> HandlerFuture + Send + Sync>;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseFrame>>>>;
type HandlerMap = Arc<Mutex<HashMap<String, ServiceHandler>>>;

/// Client for the RPC server connection.
///
/// Cheap to clone; all clones share one underlying connection. The
/// connection is established lazily by the caller and reused for the whole
/// session.
#[derive(Clone)]
pub struct RpcClient {
    /// Writer half of the websocket.
    sink: Arc<Mutex<WsSink>>,

    /// Map of pending request IDs to response channels.
    pending: PendingMap,

    /// Locally registered service operation handlers.
    handlers: HandlerMap,

    /// Handle to the background reader task.
    reader_task: Arc<tokio::task::JoinHandle<()>>,

    /// Method call timeout.
    timeout: Duration,
}

impl RpcClient {
    /// Connect to the RPC server.
    ///
    /// `token` is optional so the login flow can connect anonymously.
    pub async fn connect(settings: &Settings, token: Option<&str>) -> RpcResult<Self> {
        let url = websocket_url(&settings.server.url, &settings.server.workspace, token);

        let (stream, _) = connect_async(url.as_str()).await.map_err(|e| {
            RpcError::ConnectFailed {
                url: settings.server.url.clone(),
                message: e.to_string(),
            }
        })?;
        info!(url = %settings.server.url, workspace = %settings.server.workspace, "connected to RPC server");

        let (sink, stream) = stream.split();
        let sink = Arc::new(Mutex::new(sink));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = Self::spawn_reader_task(
            stream,
            sink.clone(),
            pending.clone(),
            handlers.clone(),
        );

        Ok(Self {
            sink,
            pending,
            handlers,
            reader_task: Arc::new(reader_task),
            timeout: Duration::from_secs(settings.server.method_timeout_secs),
        })
    }

    /// Spawn the background task that reads frames from the server.
    fn spawn_reader_task(
        mut stream: SplitStream<WsStream>,
        sink: Arc<Mutex<WsSink>>,
        pending: PendingMap,
        handlers: HandlerMap,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        Self::route_frame(text.as_str(), &sink, &pending, &handlers).await;
                    }
                    Ok(Message::Close(_)) => {
                        debug!("RPC server closed the connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "RPC read error");
                        break;
                    }
                }
            }

            // Connection gone - fail all pending calls
            let mut pending = pending.lock().await;
            for (id, tx) in pending.drain() {
                let _ = tx.send(ResponseFrame {
                    id,
                    success: false,
                    result: None,
                    error: Some(ErrorInfo {
                        code: "CONNECTION_CLOSED".to_string(),
                        message: "RPC connection closed unexpectedly".to_string(),
                    }),
                });
            }
        })
    }

    /// Route one incoming frame: replies complete pending calls, requests
    /// invoke registered handlers.
    async fn route_frame(
        text: &str,
        sink: &Arc<Mutex<WsSink>>,
        pending: &PendingMap,
        handlers: &HandlerMap,
    ) {
        let frame = match Frame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to parse RPC frame");
                return;
            }
        };

        match frame {
            Frame::Response(resp) => {
                let mut pending = pending.lock().await;
                if let Some(tx) = pending.remove(&resp.id) {
                    let _ = tx.send(resp);
                } else {
                    debug!(id = %resp.id, "reply for unknown request id");
                }
            }
            Frame::Request(req) => {
                let handler = handlers.lock().await.get(&req.method).cloned();
                let sink = sink.clone();

                // Handlers run detached so a slow operation never blocks
                // frame routing.
                tokio::spawn(async move {
                    let response = match handler {
                        Some(handler) => match handler(req.params).await {
                            Ok(result) => ResponseFrame::ok(req.id, result),
                            Err(message) => {
                                ResponseFrame::err(req.id, "OPERATION_FAILED", message)
                            }
                        },
                        None => ResponseFrame::err(
                            req.id,
                            "METHOD_NOT_FOUND",
                            format!("method not found: {}", req.method),
                        ),
                    };

                    if let Err(e) = send_frame(&sink, &response).await {
                        warn!(error = %e, "failed to send invocation response");
                    }
                });
            }
        }
    }

    /// Call a server method and wait for its reply.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> RpcResult<serde_json::Value> {
        let id = uuid::Uuid::new_v4().to_string();

        let request = RequestFrame {
            id: id.clone(),
            method: method.to_string(),
            params,
        };

        // Register response channel
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        // Send request
        {
            let line = serde_json::to_string(&request).map_err(RpcError::SerializeFailed)?;
            let mut sink = self.sink.lock().await;
            sink.send(Message::text(line))
                .await
                .map_err(|e| RpcError::SendFailed(e.to_string()))?;
        }

        // Wait for response with timeout
        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(_)) => return Err(RpcError::ConnectionClosed),
            Err(_) => {
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(RpcError::Timeout {
                    method: method.to_string(),
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if response.success {
            Ok(response.result.unwrap_or(serde_json::Value::Null))
        } else {
            let error = response.error.unwrap_or(ErrorInfo {
                code: "UNKNOWN".to_string(),
                message: "Unknown error".to_string(),
            });
            Err(RpcError::remote(error.code, error.message))
        }
    }

    /// Call a server method and deserialize its reply.
    pub async fn call_typed<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> RpcResult<R> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(RpcError::DeserializeFailed)
    }

    /// Get a proxy for a named remote service.
    pub fn get_service(&self, service_id: &str) -> ServiceProxy {
        ServiceProxy {
            client: self.clone(),
            service_id: service_id.to_string(),
        }
    }

    /// Register a service with the server and install its operation
    /// handlers locally.
    pub async fn register_service(
        &self,
        descriptor: ServiceDescriptor,
        handlers: Vec<(String, ServiceHandler)>,
    ) -> RpcResult<RegistrationInfo> {
        {
            let mut map = self.handlers.lock().await;
            for (name, handler) in handlers {
                map.insert(format!("{}.{}", descriptor.id, name), handler);
            }
        }

        let params =
            serde_json::to_value(&descriptor).map_err(RpcError::SerializeFailed)?;
        let info: RegistrationInfo = self.call_typed("register_service", params).await?;
        info!(service = %info.id, "service registered");
        Ok(info)
    }

    /// Check if the connection is still alive.
    pub fn is_alive(&self) -> bool {
        !self.reader_task.is_finished()
    }

    /// Get the configured method call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Send a response frame over the sink.
async fn send_frame(sink: &Arc<Mutex<WsSink>>, frame: &ResponseFrame) -> RpcResult<()> {
    let line = serde_json::to_string(frame).map_err(RpcError::SerializeFailed)?;
    let mut sink = sink.lock().await;
    sink.send(Message::text(line))
        .await
        .map_err(|e| RpcError::SendFailed(e.to_string()))
}

/// Build the websocket URL from an http(s) server URL.
fn websocket_url(server_url: &str, workspace: &str, token: Option<&str>) -> String {
    let base = server_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };

    let client_id = uuid::Uuid::new_v4();
    let mut url = format!("{base}/ws?workspace={workspace}&client_id={client_id}");
    if let Some(token) = token {
        url.push_str("&token=");
        url.push_str(token);
    }
    url
}

/// Proxy for a named remote service.
#[derive(Clone)]
pub struct ServiceProxy {
    client: RpcClient,
    service_id: String,
}

impl ServiceProxy {
    /// Call an operation on the remote service.
    pub async fn call(&self, method: &str, params: serde_json::Value) -> RpcResult<serde_json::Value> {
        self.client
            .call(&format!("{}.{}", self.service_id, method), params)
            .await
    }

    /// Call an operation and deserialize its reply.
    pub async fn call_typed<R: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> RpcResult<R> {
        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(RpcError::DeserializeFailed)
    }

    /// Id of the remote service this proxy targets.
    pub fn service_id(&self) -> &str {
        &self.service_id
    }
}
