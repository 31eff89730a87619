use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::protocol::ToolsCallResponse;
use crate::tools::{parse_arguments, RegisteredTool, ToolCallError, ToolHandler};

pub const HELLO_TOOL: &str = "hello";

#[derive(Debug, Default, Deserialize)]
struct HelloArguments {
    #[serde(default)]
    name: Option<String>,
}

pub fn greet(name: Option<&str>) -> String {
    let name = name.map(str::trim).filter(|n| !n.is_empty()).unwrap_or("world");
    format!("Hello, {}!", name)
}

/// Connectivity check that needs no manifest.
pub struct HelloTool;

#[async_trait]
impl ToolHandler for HelloTool {
    async fn call(&self, arguments: Value) -> Result<ToolsCallResponse, ToolCallError> {
        let parsed: HelloArguments = parse_arguments(arguments)?;
        Ok(ToolsCallResponse::text(greet(parsed.name.as_deref())))
    }
}

pub fn builtin_tools() -> Vec<RegisteredTool> {
    vec![RegisteredTool {
        name: HELLO_TOOL.to_string(),
        description: "Say hello. Useful to check that the server is reachable.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Who to greet (default: world)" }
            }
        }),
        handler: Arc::new(HelloTool),
    }]
}
