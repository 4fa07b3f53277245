//! MCP server core: routes JSON-RPC requests to the six tools (§4.8).
//!
//! Grounded on the teacher's `McpServer` (`handle_request` dispatch table,
//! initialize handshake with protocol-version negotiation, `tools/list` +
//! `tools/call` routing), narrowed from its ~19-tool surface and dropped
//! dashboard event emission — the HTTP/WebSocket view server is out of
//! scope here (§1(b)), so there is no event channel to broadcast to.

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListResourcesResult,
    ListToolsResult, ReadResourceRequest, ServerCapabilities, ServerInfo, ToolDescription,
    ToolResultContent,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;
use laminark_core::{Config, EmbeddingWorker, Orchestrator, ProjectHash, Store};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MCP server implementation. One `McpServer` wraps one [`Orchestrator`],
/// so one process serves one project, same as everything it's built on.
pub struct McpServer {
    orchestrator: Arc<Orchestrator>,
    initialized: bool,
}

impl McpServer {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator, initialized: false }
    }

    fn store(&self) -> Arc<Store> {
        self.orchestrator.store()
    }

    fn project(&self) -> ProjectHash {
        self.orchestrator.project().clone()
    }

    fn config(&self) -> Config {
        self.orchestrator.config().clone()
    }

    fn embedding_worker(&self) -> EmbeddingWorker {
        self.orchestrator.embedding_worker()
    }

    /// Handle an incoming JSON-RPC request. `None` means the request was a
    /// notification and expects no response.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!("Rejecting request '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::server_not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params),
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resources_read(request.params),
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(&mut self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION && !request.protocol_version.is_empty() {
            info!("Client requested older protocol version {}, using it", request.protocol_version);
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        info!("MCP session initialized with protocol version {}", negotiated_version);

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo { name: "laminark".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
            capabilities: ServerCapabilities {
                tools: Some(std::collections::HashMap::from([("listChanged".to_string(), serde_json::json!(false))])),
                resources: None,
                prompts: None,
            },
            instructions: Some(
                "Laminark is a local, long-lived memory for this project. Use save_memory to record \
                 a decision or discovery worth keeping, recall to search or review past observations, \
                 topic_context to see what was stashed the last time the conversation changed topic, \
                 and query_graph/graph_stats to explore the files, tools, and decisions it has linked \
                 together. Everything is scoped to this project and stored locally."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = vec![
            ToolDescription {
                name: "save_memory".to_string(),
                description: Some("Persist a manual observation (a decision, discovery, or note worth remembering).".to_string()),
                input_schema: tools::save_memory::schema(),
            },
            ToolDescription {
                name: "recall".to_string(),
                description: Some("Unified read: search past observations, view one in full, or purge/restore it.".to_string()),
                input_schema: tools::recall::schema(),
            },
            ToolDescription {
                name: "topic_context".to_string(),
                description: Some("List stashed contexts from prior topic shifts, most recent first.".to_string()),
                input_schema: tools::topic_context::schema(),
            },
            ToolDescription {
                name: "query_graph".to_string(),
                description: Some("Search entities in the knowledge graph and traverse their neighborhood.".to_string()),
                input_schema: tools::query_graph::schema(),
            },
            ToolDescription {
                name: "graph_stats".to_string(),
                description: Some("Knowledge graph health dashboard: counts, degree stats, hotspots, duplicates.".to_string()),
                input_schema: tools::graph_stats::schema(),
            },
            ToolDescription {
                name: "discover_tools".to_string(),
                description: Some("Search the registry of tools this project has seen, by name or description.".to_string()),
                input_schema: tools::discover_tools::schema(),
            },
        ];
        let result = ListToolsResult { tools };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("Missing tool call parameters")),
        };

        let store = self.store();
        let project = self.project();
        let config = self.config();
        let embedding_worker = self.embedding_worker();

        let result = match request.name.as_str() {
            "save_memory" => tools::save_memory::execute(&store, &project, &config, request.arguments),
            "recall" => tools::recall::execute(&store, &project, &config, &embedding_worker, request.arguments),
            "topic_context" => tools::topic_context::execute(&store, &project, &config, request.arguments),
            "query_graph" => tools::query_graph::execute(&store, &project, &config, request.arguments),
            "graph_stats" => tools::graph_stats::execute(&store, &project, &config, request.arguments),
            "discover_tools" => tools::discover_tools::execute(&store, &project, &config, request.arguments),
            name => {
                return Err(JsonRpcError::method_not_found_with_message(&format!("Unknown tool: {name}")));
            }
        };

        let call_result = match result {
            Ok(content) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::to_string_pretty(&content).unwrap_or_else(|_| content.to_string()),
                }],
                is_error: Some(false),
            },
            Err(e) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::json!({ "error": e }).to_string(),
                }],
                is_error: Some(true),
            },
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    /// No resource tree is exposed — Laminark's surface is the six tools.
    /// Kept as a valid, empty response rather than dropping the method, so
    /// a generic MCP client that always calls `resources/list` still gets
    /// a well-formed answer instead of a protocol error.
    fn handle_resources_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let result = ListResourcesResult { resources: vec![] };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_resources_read(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: ReadResourceRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("Missing resource URI")),
        };
        Err(JsonRpcError::resource_not_found(&request.uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> McpServer {
        let dir = tempfile::tempdir().unwrap();
        let project = ProjectHash::for_path(dir.path());
        let orchestrator = Arc::new(Orchestrator::new(dir.path(), project).unwrap());
        std::mem::forget(dir);
        McpServer::new(orchestrator)
    }

    fn make_request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest { jsonrpc: "2.0".to_string(), id: Some(serde_json::json!(1)), method: method.to_string(), params }
    }

    #[tokio::test]
    async fn rejects_calls_before_initialize() {
        let mut server = server();
        let response = server.handle_request(make_request("tools/list", None)).await.unwrap();
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32003);
    }

    #[tokio::test]
    async fn initialize_then_tools_list_succeeds() {
        let mut server = server();
        server.handle_request(make_request("initialize", None)).await;
        let response = server.handle_request(make_request("tools/list", None)).await.unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["tools"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn calling_save_memory_then_recall_round_trips() {
        let mut server = server();
        server.handle_request(make_request("initialize", None)).await;

        let save = server
            .handle_request(make_request(
                "tools/call",
                Some(serde_json::json!({"name": "save_memory", "arguments": {"content": "Decided to use SQLite"}})),
            ))
            .await
            .unwrap();
        assert!(save.result.is_some());

        let recall = server
            .handle_request(make_request(
                "tools/call",
                Some(serde_json::json!({"name": "recall", "arguments": {"action": "search", "query": "SQLite"}})),
            ))
            .await
            .unwrap();
        let content = &recall.result.unwrap()["content"][0]["text"];
        assert!(content.as_str().unwrap().contains("SQLite"));
    }

    #[tokio::test]
    async fn unknown_tool_name_is_a_method_not_found_error() {
        let mut server = server();
        server.handle_request(make_request("initialize", None)).await;
        let response = server
            .handle_request(make_request("tools/call", Some(serde_json::json!({"name": "nonexistent"}))))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }
}
