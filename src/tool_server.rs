//! Client side of the MCP tool server (Streamable HTTP).
//!
//! Sessions are opened per agent run and closed when the run finishes; nothing
//! here is pooled or shared between requests.

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, Implementation, ProtocolVersion,
    RawContent,
};
use rmcp::service::RunningService;
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::McpConfig;

/// A tool advertised by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// What a tool call returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub content: Value,
    pub is_error: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolServerError {
    #[error("failed to connect to tool server at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("tool server {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("tool server {operation} failed: {reason}")]
    Request {
        operation: &'static str,
        reason: String,
    },
}

/// An open session with the tool server.
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolServerError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutcome, ToolServerError>;

    /// Tear the session down. Dropping a session also releases it, but
    /// without waiting for the transport to finish.
    async fn close(self: Box<Self>) -> Result<(), ToolServerError>;
}

/// Factory for tool server sessions.
#[async_trait]
pub trait ToolServer: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, ToolServerError>;

    fn endpoint(&self) -> &str;
}

/// MCP tool server reached over Streamable HTTP.
pub struct McpToolServer {
    url: String,
    client_name: String,
    request_timeout: Duration,
}

impl McpToolServer {
    pub fn new(config: &McpConfig) -> Self {
        info!("Initialized McpToolServer: url={}", config.url);
        Self {
            url: config.url.clone(),
            client_name: config.client_name.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn client_info(&self) -> ClientInfo {
        ClientInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: self.client_name.clone(),
                title: None,
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
        }
    }
}

#[async_trait]
impl ToolServer for McpToolServer {
    async fn connect(&self) -> Result<Box<dyn ToolSession>, ToolServerError> {
        let transport = StreamableHttpClientTransport::from_uri(self.url.clone());
        let service = tokio::time::timeout(self.request_timeout, self.client_info().serve(transport))
            .await
            .map_err(|_| ToolServerError::Timeout {
                operation: "handshake",
                timeout: self.request_timeout,
            })?
            .map_err(|e| ToolServerError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        debug!(url = %self.url, "Opened MCP session");
        Ok(Box::new(McpToolSession {
            service,
            request_timeout: self.request_timeout,
        }))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

struct McpToolSession {
    service: RunningService<RoleClient, ClientInfo>,
    request_timeout: Duration,
}

#[async_trait]
impl ToolSession for McpToolSession {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolServerError> {
        let tools = tokio::time::timeout(self.request_timeout, self.service.peer().list_all_tools())
            .await
            .map_err(|_| ToolServerError::Timeout {
                operation: "tools/list",
                timeout: self.request_timeout,
            })?
            .map_err(|e| ToolServerError::Request {
                operation: "tools/list",
                reason: e.to_string(),
            })?;

        Ok(tools
            .into_iter()
            .map(|tool| ToolSpec {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: Value::Object((*tool.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutcome, ToolServerError> {
        let call = self.service.peer().call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(arguments),
        });
        let result = tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| ToolServerError::Timeout {
                operation: "tools/call",
                timeout: self.request_timeout,
            })?
            .map_err(|e| ToolServerError::Request {
                operation: "tools/call",
                reason: e.to_string(),
            })?;

        let texts = result
            .content
            .into_iter()
            .filter_map(|block| match block.raw {
                RawContent::Text(text) => Some(text.text),
                _ => None,
            })
            .collect();

        Ok(ToolOutcome {
            content: tool_result_content(result.structured_content, texts),
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(self: Box<Self>) -> Result<(), ToolServerError> {
        self.service
            .cancel()
            .await
            .map(|reason| debug!(?reason, "Closed MCP session"))
            .map_err(|e| ToolServerError::Request {
                operation: "close",
                reason: e.to_string(),
            })
    }
}

/// Collapse an MCP tool result into a single JSON value.
///
/// Servers that wrap scalar returns as `{"result": v}` structured content get
/// `v`; otherwise a single text block that reads as a number becomes that
/// number, and any other text stays a string.
pub fn tool_result_content(structured: Option<Value>, mut texts: Vec<String>) -> Value {
    match structured {
        Some(Value::Object(mut map)) if map.len() == 1 && map.contains_key("result") => {
            return map.remove("result").unwrap_or(Value::Null);
        }
        Some(value) => return value,
        None => {}
    }

    match texts.len() {
        0 => Value::Null,
        1 => {
            let text = texts.remove(0);
            match serde_json::from_str::<Value>(text.trim()) {
                Ok(number @ Value::Number(_)) => number,
                _ => Value::String(text),
            }
        }
        _ => Value::Array(texts.into_iter().map(Value::String).collect()),
    }
}
