//! MCP tools (§4.8): the six-tool query/tooling surface `server.rs`
//! dispatches `tools/call` requests to. Each module exposes
//! `schema() -> serde_json::Value` and `execute(store, project, config,
//! args) -> Result<Value, String>`, following the teacher's tool-module
//! shape (schema/execute pair, string error channel).

pub mod discover_tools;
pub mod graph_stats;
pub mod query_graph;
pub mod recall;
pub mod save_memory;
pub mod topic_context;
