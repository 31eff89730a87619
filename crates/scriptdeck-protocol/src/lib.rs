pub mod client;
pub mod framing;
pub mod jsonrpc;

pub use client::{ClientError, LineClient};
pub use framing::{read_frame, read_frame_bytes, write_frame, write_line};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
