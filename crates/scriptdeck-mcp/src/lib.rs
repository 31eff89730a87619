//! Serve a project's package.json scripts as MCP tools.

pub mod builtin;
pub mod config;
pub mod discover;
pub mod ident;
pub mod initialize;
pub mod manifest;
pub mod protocol;
pub mod register;
pub mod runner;
pub mod server;
pub mod tools;

pub use config::ServerConfig;
pub use register::{register_scripts, RegistrationReport};
pub use runner::ScriptRunner;
pub use server::{ScriptServer, ServerError};
pub use tools::{OperationRegistry, RegisteredTool, ToolHandler, ToolRegistry};
