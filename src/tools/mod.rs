//! Built-in tool set.
//!
//! The registry is a compile-time ordered array of schemas — the single
//! source of truth for the model-facing parameter descriptions embedded in
//! request payloads and for the dispatch kind the executor switches on. The
//! registry order is the order tool descriptors appear on the wire.

pub mod executor;
pub mod list_dir;
pub mod patch;
pub mod read_file;
pub mod search;

use crate::types::{FunctionDefinition, ToolDefinition};
use serde_json::{json, Value};

/// Dispatch target for a tool id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ListDirectory,
    ReadFile,
    Search,
    ApplyPatch,
}

/// Strongest sandbox permission a tool needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    WorkspaceWrite,
}

/// Static descriptor for one tool.
pub struct ToolSchema {
    pub id: &'static str,
    pub kind: ToolKind,
    pub summary: &'static str,
    pub permission: Permission,
    /// JSON Schema for the arguments object.
    pub parameters: fn() -> Value,
    /// Render a short human summary from the tool's success payload.
    pub summarize: fn(&Value) -> Option<String>,
}

/// All tools, in wire order.
pub static TOOL_SCHEMAS: &[ToolSchema] = &[
    ToolSchema {
        id: "list_directory",
        kind: ToolKind::ListDirectory,
        summary: "List the entries of a directory inside the workspace.",
        permission: Permission::ReadOnly,
        parameters: list_dir::parameters,
        summarize: list_dir::summarize,
    },
    ToolSchema {
        id: "read_file",
        kind: ToolKind::ReadFile,
        summary: "Read a file by line range, or slice out the indented block around an anchor line.",
        permission: Permission::ReadOnly,
        parameters: read_file::parameters,
        summarize: read_file::summarize,
    },
    ToolSchema {
        id: "search",
        kind: ToolKind::Search,
        summary: "Search workspace files by text/regex (ripgrep) or syntax pattern (ast-grep).",
        permission: Permission::ReadOnly,
        parameters: search::parameters,
        summarize: search::summarize,
    },
    ToolSchema {
        id: "apply_patch",
        kind: ToolKind::ApplyPatch,
        summary: "Apply a structured patch that adds, deletes, or updates workspace files.",
        permission: Permission::WorkspaceWrite,
        parameters: patch::parameters,
        summarize: patch::summarize,
    },
];

/// Look up a schema by tool id.
pub fn find(id: &str) -> Option<&'static ToolSchema> {
    TOOL_SCHEMAS.iter().find(|schema| schema.id == id)
}

/// Tool descriptors for the request payload.
pub fn definitions() -> Vec<ToolDefinition> {
    TOOL_SCHEMAS
        .iter()
        .map(|schema| ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: schema.id.to_string(),
                description: schema.summary.to_string(),
                parameters: (schema.parameters)(),
            },
        })
        .collect()
}

/// Shared helper for count-style summaries: `3 matches`, `1 file changed`.
fn count_summary(value: &Value, key: &str, singular: &str, plural: &str) -> Option<String> {
    let count = value.get(key)?.as_u64()?;
    let noun = if count == 1 { singular } else { plural };
    let truncated = value
        .get("truncated")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if truncated {
        Some(format!("{count} {noun}, truncated"))
    } else {
        Some(format!("{count} {noun}"))
    }
}

/// Length-of-array summary used by tools whose payload carries a list.
fn list_len_summary(value: &Value, key: &str, singular: &str, plural: &str) -> Option<String> {
    let len = value.get(key)?.as_array()?.len() as u64;
    count_summary(&json!({ "n": len, "truncated": value.get("truncated") }), "n", singular, plural)
}
