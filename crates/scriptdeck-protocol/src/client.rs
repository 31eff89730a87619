use std::collections::VecDeque;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};

use crate::framing::{read_frame, write_frame};
use crate::{JsonRpcRequest, JsonRpcResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid message from server: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stream closed while waiting for response")]
    Closed,
}

/// Line-oriented JSON-RPC client over an arbitrary async byte stream.
///
/// Server-initiated notifications that arrive while waiting for a response are
/// queued and can be drained with [`LineClient::take_notifications`].
pub struct LineClient<R, W> {
    reader: R,
    writer: W,
    next_id: u64,
    notifications: VecDeque<JsonRpcRequest>,
}

impl<R, W> LineClient<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            next_id: 1,
            notifications: VecDeque::new(),
        }
    }

    /// Send a request with a fresh numeric id and wait for its response.
    pub async fn request(&mut self, method: &str, params: Value) -> Result<JsonRpcResponse, ClientError> {
        let id = self.next_id;
        self.next_id += 1;
        self.call(JsonRpcRequest::new(method, params).with_id(id)).await
    }

    pub async fn call(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse, ClientError> {
        let id = request.id.clone().unwrap_or(Value::Null);
        write_frame(&mut self.writer, &request).await?;

        loop {
            let Some(line) = read_frame(&mut self.reader).await? else {
                return Err(ClientError::Closed);
            };

            let message: Value = serde_json::from_str(&line)?;
            if message.get("method").is_some() {
                self.notifications.push_back(serde_json::from_value(message)?);
                continue;
            }

            let response: JsonRpcResponse = serde_json::from_value(message)?;
            if response.id == id {
                return Ok(response);
            }
        }
    }

    pub async fn notify(&mut self, method: &str, params: Value) -> Result<(), ClientError> {
        write_frame(&mut self.writer, &JsonRpcRequest::new(method, params)).await?;
        Ok(())
    }

    /// Wait for the next server notification, returning queued ones first.
    pub async fn next_notification(&mut self) -> Result<JsonRpcRequest, ClientError> {
        if let Some(queued) = self.notifications.pop_front() {
            return Ok(queued);
        }

        loop {
            let Some(line) = read_frame(&mut self.reader).await? else {
                return Err(ClientError::Closed);
            };
            let message: Value = serde_json::from_str(&line)?;
            if message.get("method").is_some() {
                return Ok(serde_json::from_value(message)?);
            }
        }
    }

    pub fn take_notifications(&mut self) -> Vec<JsonRpcRequest> {
        self.notifications.drain(..).collect()
    }
}
