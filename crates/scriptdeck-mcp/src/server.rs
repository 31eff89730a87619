//! MCP Server
//!
//! Serves the tool registry over newline-delimited JSON-RPC on any async byte
//! stream (stdio in production).
//!
//! Lifecycle:
//! 1. build the server and register tools (`register_builtins`, `load_manifest`)
//! 2. `serve` connects the transport; bulk registration is refused from then on
//! 3. `register_one` may still add tools and announces them with
//!    `notifications/tools/list_changed`
//!
//! Each `tools/call` runs on its own task. Replies go through a single writer
//! task, so lines never interleave.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scriptdeck_protocol::framing::{read_frame_bytes, write_line};
use scriptdeck_protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::builtin::builtin_tools;
use crate::config::ServerConfig;
use crate::initialize::handle_initialize;
use crate::manifest::{load_manifest, manifest_dir};
use crate::protocol::{methods, InitializeRequest, ToolsCallRequest};
use crate::register::{register_scripts, RegistrationReport};
use crate::runner::ScriptRunner;
use crate::tools::{OperationRegistry, RegisteredTool, ToolCallError, ToolRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("transport already connected")]
    AlreadyConnected,

    #[error("failed to read request: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to write response: {0}")]
    Write(#[source] std::io::Error),

    #[error("writer task failed: {0}")]
    WriterTask(String),
}

struct ServerState {
    config: ServerConfig,
    registry: Arc<ToolRegistry>,
    runner: Arc<ScriptRunner>,
    connected: AtomicBool,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

/// Script tool server (cheaply cloneable)
#[derive(Clone)]
pub struct ScriptServer {
    state: Arc<ServerState>,
}

impl ScriptServer {
    pub fn new(config: ServerConfig) -> Self {
        let runner = ScriptRunner::from_command_line(&config.package_manager);
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: ServerConfig, runner: ScriptRunner) -> Self {
        Self {
            state: Arc::new(ServerState {
                config,
                registry: Arc::new(ToolRegistry::new()),
                runner: Arc::new(runner),
                connected: AtomicBool::new(false),
                outbound: Mutex::new(None),
            }),
        }
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.state.registry)
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    /// Register the built-in tools if enabled. Call before `load_manifest` so
    /// scripts with the same names get suffixed identifiers.
    pub async fn register_builtins(&self) {
        if !self.state.config.builtin_tools {
            return;
        }
        for tool in builtin_tools() {
            self.register_one(tool).await;
        }
    }

    /// Register one tool per script in the manifest at `path`.
    ///
    /// Must run before `serve`. A manifest that cannot be read or parsed is
    /// logged and registers nothing; the server still starts.
    pub async fn load_manifest(&self, path: &Path) -> Result<RegistrationReport, ServerError> {
        if self.is_connected() {
            return Err(ServerError::AlreadyConnected);
        }

        let manifest = match load_manifest(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                error!(error = %e, "Failed to load manifest, no script tools registered");
                return Ok(RegistrationReport::default());
            }
        };

        let report = register_scripts(
            &manifest.scripts,
            &manifest_dir(path),
            &self.state.runner,
            self.state.registry.as_ref(),
        )
        .await;

        info!(
            path = %path.display(),
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            "Registered script tools"
        );
        Ok(report)
    }

    /// Add a single tool, before or after connecting. Returns false if the
    /// name is taken. Once connected, the client is told the list changed.
    pub async fn register_one(&self, tool: RegisteredTool) -> bool {
        let name = tool.name.clone();
        if !self.state.registry.insert_if_absent(tool).await {
            warn!(tool = %name, "Tool already registered");
            return false;
        }

        debug!(tool = %name, "Registered tool");
        if let Some(tx) = self.state.outbound.lock().await.as_ref() {
            let notification = JsonRpcRequest::new(methods::TOOLS_LIST_CHANGED, Value::Null);
            enqueue(tx, &notification);
        }
        true
    }

    pub async fn serve_stdio(&self) -> Result<(), ServerError> {
        info!("Starting MCP server in STDIO mode");
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Connect the transport and serve until the reader reaches end of stream.
    /// In-flight tool calls finish and are answered before this returns.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin + Send,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.state.connected.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyConnected);
        }

        let tools = self.state.registry.len().await;
        info!(tools, "Transport connected");

        let (tx, rx) = mpsc::unbounded_channel::<String>();
        *self.state.outbound.lock().await = Some(tx.clone());
        let writer_task = tokio::spawn(write_loop(writer, rx));

        let mut reader = BufReader::new(reader);
        let read_result = loop {
            match read_frame_bytes(&mut reader).await {
                Ok(Some(frame)) => self.handle_frame(&frame, &tx).await,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break Ok(());
                }
                Err(e) => {
                    error!(error = %e, "Error reading request");
                    break Err(ServerError::Read(e));
                }
            }
        };

        // The writer drains once every sender is gone, including those held by
        // running tool calls.
        self.state.outbound.lock().await.take();
        drop(tx);

        let write_result = writer_task
            .await
            .map_err(|e| ServerError::WriterTask(e.to_string()))?;
        read_result?;
        write_result.map_err(ServerError::Write)
    }

    async fn handle_frame(&self, frame: &[u8], tx: &mpsc::UnboundedSender<String>) {
        debug!(request = %String::from_utf8_lossy(frame), "Received request");

        let message: Value = match serde_json::from_slice(frame) {
            Ok(value) => value,
            Err(e) => {
                let resp = JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error(format!("parse error: {}", e)));
                enqueue(tx, &resp);
                return;
            }
        };

        let fallback_id = message.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(req) => req,
            Err(e) => {
                let resp = JsonRpcResponse::error(
                    fallback_id,
                    JsonRpcError::invalid_request(format!("invalid request: {}", e)),
                );
                enqueue(tx, &resp);
                return;
            }
        };

        if request.is_notification() {
            self.handle_notification(&request);
            return;
        }
        let id = request.id.clone().unwrap_or(Value::Null);

        if request.jsonrpc != JSONRPC_VERSION {
            let resp = JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("Invalid JSON-RPC version, expected 2.0"),
            );
            enqueue(tx, &resp);
            return;
        }

        let response = match request.method.as_str() {
            methods::INITIALIZE => match serde_json::from_value::<InitializeRequest>(request.params) {
                Ok(init) => to_response(id, &handle_initialize(init, &self.state.config.server_name)),
                Err(e) => JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("invalid initialize params: {}", e)),
                ),
            },
            methods::PING => JsonRpcResponse::success(id, json!({})),
            methods::TOOLS_LIST => to_response(id, &self.state.registry.list_response().await),
            methods::TOOLS_CALL => match serde_json::from_value::<ToolsCallRequest>(request.params) {
                Ok(call) => {
                    self.spawn_tool_call(id, call, tx.clone());
                    return;
                }
                Err(e) => JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_params(format!("invalid tools/call params: {}", e)),
                ),
            },
            other => {
                warn!(method = %other, "Unknown method");
                JsonRpcResponse::error(id, JsonRpcError::method_not_found(other))
            }
        };

        enqueue(tx, &response);
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            methods::INITIALIZED => debug!("Received initialized notification"),
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    fn spawn_tool_call(&self, id: Value, call: ToolsCallRequest, tx: mpsc::UnboundedSender<String>) {
        let registry = Arc::clone(&self.state.registry);
        tokio::spawn(async move {
            debug!(tool = %call.name, "Calling tool");
            let response = match registry.call_tool(&call.name, call.arguments).await {
                Ok(result) => to_response(id, &result),
                Err(e @ ToolCallError::UnknownTool(_)) => {
                    JsonRpcResponse::error(id, JsonRpcError::new(JsonRpcError::METHOD_NOT_FOUND, e.to_string()))
                }
                Err(e @ ToolCallError::InvalidArguments(_)) => {
                    JsonRpcResponse::error(id, JsonRpcError::invalid_params(e.to_string()))
                }
            };
            enqueue(&tx, &response);
        });
    }
}

fn to_response<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(format!("failed to encode result: {}", e))),
    }
}

fn enqueue<T: Serialize>(tx: &mpsc::UnboundedSender<String>, message: &T) {
    match serde_json::to_string(message) {
        Ok(line) => {
            if tx.send(line).is_err() {
                debug!("Writer closed, dropping message");
            }
        }
        Err(e) => error!(error = %e, "Failed to serialize message"),
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        debug!(response = %line, "Sending response");
        if let Err(e) = write_line(&mut writer, &line).await {
            error!(error = %e, "Error writing response");
            return Err(e);
        }
    }
    Ok(())
}
