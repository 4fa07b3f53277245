//! Pure admission/extraction rules for hook events (§4.4 steps a-e).
//!
//! Kept free of `Store` access so every rule here is a plain function that
//! can be unit tested without a database.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Laminark's own tool names, rejected at step (a) to prevent a tool call
/// that reads memory from generating an observation about reading memory.
pub const SELF_TOOL_NAMES: &[&str] =
    &["save_memory", "recall", "topic_context", "query_graph", "graph_stats", "discover_tools"];

pub fn is_self_referential(tool_name: &str) -> bool {
    SELF_TOOL_NAMES.iter().any(|t| *t == tool_name)
}

/// Walk every string value in `value` and check it against the excluded
/// path fragments (`.env`, `credentials`, `.pem`, ...). Catches fragments
/// buried in nested tool-input shapes (e.g. `{"file_path": "..."}`).
pub fn matches_excluded_path(value: &Value, fragments: &[String]) -> bool {
    match value {
        Value::String(s) => fragments.iter().any(|f| s.contains(f.as_str())),
        Value::Array(items) => items.iter().any(|v| matches_excluded_path(v, fragments)),
        Value::Object(map) => map.values().any(|v| matches_excluded_path(v, fragments)),
        _ => false,
    }
}

pub fn is_high_signal_tool(tool_name: &str) -> bool {
    matches!(tool_name, "Write" | "Edit" | "MultiEdit" | "NotebookEdit")
}

fn is_pure_navigation_tool(tool_name: &str) -> bool {
    matches!(tool_name, "Read" | "Glob" | "Grep")
}

/// Build the (title, content) pair a tool invocation extracts into, or
/// `None` if the tool type produces nothing worth persisting.
pub fn summarize_tool_event(
    tool_name: &str,
    tool_input: Option<&Value>,
    tool_response: Option<&Value>,
) -> (Option<String>, String) {
    if is_high_signal_tool(tool_name) {
        let path = tool_input
            .and_then(|v| v.get("file_path").or_else(|| v.get("path")))
            .and_then(Value::as_str)
            .map(str::to_string);
        let content = match tool_input {
            Some(v) => format!("{tool_name} {}", compact_json(v)),
            None => tool_name.to_string(),
        };
        return (path, content);
    }

    if tool_name == "Bash" {
        let command = tool_input.and_then(|v| v.get("command")).and_then(Value::as_str).unwrap_or("");
        let output = tool_response
            .and_then(|v| v.get("stdout").or_else(|| v.get("output")))
            .and_then(Value::as_str)
            .unwrap_or("");
        let content = format!("$ {command}\n{}", truncate(output, 2_000));
        return (Some(format!("Bash: {}", truncate(command, 80))), content);
    }

    if is_pure_navigation_tool(tool_name) {
        let target = tool_input
            .and_then(|v| v.get("pattern").or_else(|| v.get("file_path")).or_else(|| v.get("path")))
            .and_then(Value::as_str)
            .unwrap_or("");
        return (None, format!("{tool_name} {target}"));
    }

    // MCP tool or anything unrecognized: name + input digest only.
    let digest = tool_input.map(compact_json).map(|s| short_digest(&s)).unwrap_or_default();
    (Some(tool_name.to_string()), format!("{tool_name} (input:{digest})"))
}

fn compact_json(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn short_digest(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    hash.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

const DECISION_ERROR_INDICATORS: &[&str] =
    &["error", "Error", "failed", "Failed", "decided", "because", "exception", "panic"];

/// Content over `large_bytes` is only admitted when it reads like a
/// decision or an error, per step (e).
pub fn should_admit_large_content(content: &str, large_bytes: usize) -> bool {
    if content.len() <= large_bytes {
        return true;
    }
    DECISION_ERROR_INDICATORS.iter().any(|kw| content.contains(kw))
}

/// Noise categories: build output, package-install logs, repetitive lint
/// warnings, empty output. Always admits Write/Edit regardless of content.
pub fn is_noise(tool_name: &str, content: &str, categories: &[String]) -> bool {
    if is_high_signal_tool(tool_name) {
        return false;
    }
    let trimmed = content.trim();
    if categories.iter().any(|c| c == "empty_output") && trimmed.is_empty() {
        return true;
    }
    if categories.iter().any(|c| c == "build_output")
        && (trimmed.contains("Compiling") || trimmed.contains("Finished dev") || trimmed.contains("Finished release"))
    {
        return true;
    }
    if categories.iter().any(|c| c == "package_install")
        && (trimmed.contains("npm install") || trimmed.contains("Installing collected packages") || trimmed.contains("Resolving dependencies"))
    {
        return true;
    }
    if categories.iter().any(|c| c == "repetitive_lint")
        && (trimmed.contains("warning:") && trimmed.matches("warning:").count() > 3)
    {
        return true;
    }
    false
}
