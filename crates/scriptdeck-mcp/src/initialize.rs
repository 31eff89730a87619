use tracing::info;

use crate::protocol::{
    InitializeRequest, InitializeResponse, ServerCapabilities, ServerInfo, ToolsCapabilities, MCP_PROTOCOL_VERSION,
};

pub fn handle_initialize(request: InitializeRequest, server_name: &str) -> InitializeResponse {
    info!(
        client_name = %request.client_info.name,
        client_version = %request.client_info.version,
        protocol_version = %request.protocol_version,
        "Client initializing"
    );

    // Accept any client protocol version; the client adapts to ours.
    InitializeResponse {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapabilities { list_changed: true },
        },
        server_info: ServerInfo {
            name: server_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        instructions: "Each tool runs one script from the project's package.json through the package manager. \
Pass extra command-line arguments in `args`. The result is the script's combined stdout and stderr; \
a failing script is reported in that text, not as a tool error, so read the output to judge success."
            .to_string(),
    }
}
