//! Directory listing tool.

use crate::error::ToolError;
use crate::sandbox::Sandbox;
use serde::Deserialize;
use serde_json::{json, Value};

/// Entries returned when the model doesn't ask for a count.
const DEFAULT_MAX_ENTRIES: usize = 500;
/// Hard ceiling regardless of what the model asks for.
const MAX_MAX_ENTRIES: usize = 2000;

#[derive(Debug, Deserialize)]
struct Args {
    #[serde(default = "default_path")]
    path: String,
    max_entries: Option<usize>,
}

fn default_path() -> String {
    ".".to_string()
}

/// JSON Schema for the arguments object.
pub fn parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "Directory to list, relative to the workspace root. Defaults to the root."
            },
            "max_entries": {
                "type": "integer",
                "description": "Maximum entries to return (default 500, cap 2000)."
            }
        },
        "required": []
    })
}

/// Summary formatter reading the success payload.
pub fn summarize(value: &Value) -> Option<String> {
    super::list_len_summary(value, "entries", "entry", "entries")
}

/// List one directory inside the sandbox.
pub async fn run(sandbox: &Sandbox, arguments: &str) -> Result<Value, ToolError> {
    let args: Args =
        serde_json::from_str(arguments).map_err(|e| ToolError::InvalidPayload(e.to_string()))?;

    let max_entries = match args.max_entries {
        Some(0) => return Err(ToolError::NoEntriesRequested),
        Some(n) => n.min(MAX_MAX_ENTRIES),
        None => DEFAULT_MAX_ENTRIES,
    };

    let dir = sandbox.resolve(&args.path)?;
    if !dir.is_dir() {
        return Err(ToolError::PathNotDirectory(args.path));
    }

    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(&dir).await.map_err(ToolError::from)?;
    while let Some(entry) = reader.next_entry().await.map_err(ToolError::from)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type().await.map_err(ToolError::from)?;
        let kind = if file_type.is_dir() {
            "dir"
        } else if file_type.is_file() {
            "file"
        } else if file_type.is_symlink() {
            "symlink"
        } else {
            "other"
        };
        let size = if file_type.is_file() {
            entry.metadata().await.ok().map(|meta| meta.len())
        } else {
            None
        };
        entries.push((name, kind, size));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let truncated = entries.len() > max_entries;
    entries.truncate(max_entries);

    let entries: Vec<Value> = entries
        .into_iter()
        .map(|(name, kind, size)| match size {
            Some(size) => json!({"name": name, "kind": kind, "size": size}),
            None => json!({"name": name, "kind": kind}),
        })
        .collect();

    Ok(json!({
        "path": sandbox.display_relative(&dir),
        "entries": entries,
        "truncated": truncated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxMode;
    use crate::testsupport::TestTempDir;

    fn fixture_sandbox() -> (TestTempDir, Sandbox) {
        let fixture = TestTempDir::new("list-dir");
        fixture.write_text("b.txt", "bb");
        fixture.write_text("a.txt", "a");
        fixture.write_text("sub/nested.txt", "n");
        let sandbox = Sandbox::new(fixture.path(), SandboxMode::ReadOnly).unwrap();
        (fixture, sandbox)
    }

    #[tokio::test]
    async fn lists_entries_sorted_by_name() {
        let (_fixture, sandbox) = fixture_sandbox();
        let result = run(&sandbox, "{}").await.unwrap();

        let names: Vec<&str> = result["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt", "sub"]);
        assert_eq!(result["truncated"], false);
    }

    #[tokio::test]
    async fn reports_kinds_and_file_sizes() {
        let (_fixture, sandbox) = fixture_sandbox();
        let result = run(&sandbox, "{}").await.unwrap();
        let entries = result["entries"].as_array().unwrap();

        let a = entries.iter().find(|e| e["name"] == "a.txt").unwrap();
        assert_eq!(a["kind"], "file");
        assert_eq!(a["size"], 1);

        let sub = entries.iter().find(|e| e["name"] == "sub").unwrap();
        assert_eq!(sub["kind"], "dir");
        assert!(sub.get("size").is_none());
    }

    #[tokio::test]
    async fn honors_max_entries_and_flags_truncation() {
        let (_fixture, sandbox) = fixture_sandbox();
        let result = run(&sandbox, r#"{"max_entries": 2}"#).await.unwrap();
        assert_eq!(result["entries"].as_array().unwrap().len(), 2);
        assert_eq!(result["truncated"], true);
    }

    #[tokio::test]
    async fn zero_max_entries_is_rejected() {
        let (_fixture, sandbox) = fixture_sandbox();
        let err = run(&sandbox, r#"{"max_entries": 0}"#).await.unwrap_err();
        assert!(matches!(err, ToolError::NoEntriesRequested));
    }

    #[tokio::test]
    async fn file_target_is_not_a_directory() {
        let (_fixture, sandbox) = fixture_sandbox();
        let err = run(&sandbox, r#"{"path": "a.txt"}"#).await.unwrap_err();
        assert!(matches!(err, ToolError::PathNotDirectory(_)));
    }

    #[tokio::test]
    async fn missing_target_is_path_not_found() {
        let (_fixture, sandbox) = fixture_sandbox();
        let err = run(&sandbox, r#"{"path": "nope"}"#).await.unwrap_err();
        assert!(matches!(err, ToolError::PathNotFound(_)));
    }

    #[tokio::test]
    async fn invalid_json_arguments_are_rejected() {
        let (_fixture, sandbox) = fixture_sandbox();
        let err = run(&sandbox, "not json").await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidPayload(_)));
    }

    #[test]
    fn summarize_counts_entries() {
        let value = json!({"entries": [{"name": "a"}], "truncated": false});
        assert_eq!(summarize(&value).unwrap(), "1 entry");
    }
}
