use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::protocol::{McpTool, ToolsCallResponse, ToolsListResponse};

/// Something a registered tool delegates to when called.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<ToolsCallResponse, ToolCallError>;
}

/// A tool as handed to the registry. Never mutated after insertion.
#[derive(Clone)]
pub struct RegisteredTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    pub fn to_mcp(&self) -> McpTool {
        McpTool {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// The narrow registry capability registration needs.
#[async_trait]
pub trait OperationRegistry: Send + Sync {
    /// Identifiers currently registered.
    async fn existing_identifiers(&self) -> HashSet<String>;

    /// Insert `tool` unless its name is taken. Returns whether it was inserted.
    async fn insert_if_absent(&self, tool: RegisteredTool) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolCallError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Default)]
struct RegistryInner {
    order: Vec<String>,
    tools: HashMap<String, RegisteredTool>,
}

/// Tools served over MCP, listed in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<RegistryInner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, name: &str) -> Option<RegisteredTool> {
        self.inner.read().await.tools.get(name).cloned()
    }

    pub async fn list_response(&self) -> ToolsListResponse {
        let inner = self.inner.read().await;
        let tools = inner
            .order
            .iter()
            .filter_map(|name| inner.tools.get(name))
            .map(RegisteredTool::to_mcp)
            .collect();

        ToolsListResponse {
            tools,
            next_cursor: None,
        }
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResponse, ToolCallError> {
        // Clone the handler out so the lock is not held while the tool runs.
        let Some(tool) = self.get(name).await else {
            return Err(ToolCallError::UnknownTool(name.to_string()));
        };

        tool.handler.call(arguments).await
    }
}

#[async_trait]
impl OperationRegistry for ToolRegistry {
    async fn existing_identifiers(&self) -> HashSet<String> {
        self.inner.read().await.tools.keys().cloned().collect()
    }

    async fn insert_if_absent(&self, tool: RegisteredTool) -> bool {
        let mut inner = self.inner.write().await;
        if inner.tools.contains_key(&tool.name) {
            return false;
        }

        inner.order.push(tool.name.clone());
        inner.tools.insert(tool.name.clone(), tool);
        true
    }
}

/// Decode tool arguments; a missing or `null` payload decodes as `T::default()`.
pub fn parse_arguments<T>(arguments: Value) -> Result<T, ToolCallError>
where
    T: DeserializeOwned + Default,
{
    if arguments.is_null() {
        return Ok(T::default());
    }

    serde_json::from_value(arguments).map_err(|e| ToolCallError::InvalidArguments(e.to_string()))
}
