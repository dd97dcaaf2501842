//! MCP Server Core
//!
//! Routes JSON-RPC requests to the tool implementations. Every error that
//! leaves a tool is decorated with its recovery hint here; raw errors never
//! cross the boundary.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use speckit_core::MemoryEngine;

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;

/// MCP server state
pub struct McpServer {
    engine: Arc<MemoryEngine>,
    initialized: bool,
}

impl McpServer {
    pub fn new(engine: Arc<MemoryEngine>) -> Self {
        Self {
            engine,
            initialized: false,
        }
    }

    /// Handle one JSON-RPC request; notifications return no response
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("handling request: {}", request.method);

        if !self.initialized
            && request.method != "initialize"
            && request.method != "notifications/initialized"
        {
            warn!("rejecting '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => Err(JsonRpcError::method_not_found(method)),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Use the client's version when it is older than ours; clients
        // reject servers that answer with a newer protocol.
        let negotiated = if request.protocol_version.as_str() < MCP_VERSION {
            info!("client requested protocol {}, using it", request.protocol_version);
            request.protocol_version
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        info!("MCP session initialized with protocol {}", negotiated);

        let result = InitializeResult {
            protocol_version: negotiated,
            server_info: ServerInfo {
                name: "speckit-memory".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some({
                    let mut map = HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                }),
            },
            instructions: Some(
                "Speckit Memory is the spec-aware memory for this repository. Start with \
                 memory_context to pull relevant decisions before a task, save new decisions \
                 with memory_save (the prediction-error gate handles duplicates and \
                 contradictions), and bracket larger tasks with task_preflight / \
                 task_postflight so causal links accumulate."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = tools::catalog()
            .into_iter()
            .map(|(name, description, input_schema)| ToolDescription {
                name,
                description: Some(description),
                input_schema,
            })
            .collect();

        serde_json::to_value(ListToolsResult { tools })
            .map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call params")),
        };

        let Some(result) = tools::dispatch(&request.name, &self.engine, request.arguments).await
        else {
            return Err(JsonRpcError::method_not_found(&request.name));
        };

        let call_result = match result {
            Ok(value) => CallToolResult::json(&value),
            Err(error) => {
                // Structured error + recovery hint; never a raw exception
                warn!(tool = %request.name, code = %error.code, "tool call failed");
                CallToolResult::error(&error.to_tool_payload(&request.name))
            }
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
