//! Structured patch application.
//!
//! The model writes patches in a sentinel-framed envelope:
//!
//! ```text
//! *** Begin Patch
//! *** Update File: src/lib.rs
//! @@ fn main
//!  context
//! -old line
//! +new line
//! *** End Patch
//! ```
//!
//! Operations are `Add File`, `Delete File`, and `Update File` (optionally
//! `Move to:`). Update chunks locate their old-line window with three
//! matching passes — exact, trailing-whitespace trimmed, both-side trimmed —
//! and conflict deterministically when none matches. Nothing fuzzier than
//! whitespace normalization is attempted.

use crate::error::ToolError;
use crate::sandbox::Sandbox;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Update sources larger than this are refused.
const MAX_SOURCE_BYTES: u64 = 8 * 1024 * 1024;

const BEGIN_SENTINEL: &str = "*** Begin Patch";
const END_SENTINEL: &str = "*** End Patch";
const ADD_PREFIX: &str = "*** Add File: ";
const DELETE_PREFIX: &str = "*** Delete File: ";
const UPDATE_PREFIX: &str = "*** Update File: ";
const MOVE_PREFIX: &str = "*** Move to: ";
const EOF_SENTINEL: &str = "*** End of File";

#[derive(Debug, Deserialize)]
struct Args {
    input: String,
    /// Optional base directory for relative patch paths.
    workdir: Option<String>,
}

/// JSON Schema for the arguments object.
pub fn parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "input": {
                "type": "string",
                "description": "Patch text framed by *** Begin Patch / *** End Patch."
            },
            "workdir": {
                "type": "string",
                "description": "Base directory for relative patch paths (default workspace root)."
            }
        },
        "required": ["input"]
    })
}

/// Summary formatter reading the success payload.
pub fn summarize(value: &Value) -> Option<String> {
    super::count_summary(value, "files_changed", "file changed", "files changed")
}

// ---------------------------------------------------------------------------
// Patch model
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum PatchOp {
    Add { path: String, content: String },
    Delete { path: String },
    Update { path: String, move_to: Option<String>, chunks: Vec<Chunk> },
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Chunk {
    /// Optional locator line following `@@`.
    context_hint: Option<String>,
    /// Context plus deleted lines, as they must appear in the source.
    old_lines: Vec<String>,
    /// Context plus inserted lines, as they appear after the chunk.
    new_lines: Vec<String>,
    /// The match window must sit at end-of-file.
    is_eof: bool,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse the sentinel-framed envelope into operations.
fn parse_patch(text: &str) -> Result<Vec<PatchOp>, ToolError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        return Err(ToolError::InvalidPatch("patch must span at least two lines".to_string()));
    }
    if lines[0] != BEGIN_SENTINEL {
        return Err(ToolError::InvalidPatch(format!("patch must start with `{BEGIN_SENTINEL}`")));
    }
    if lines[lines.len() - 1] != END_SENTINEL {
        return Err(ToolError::InvalidPatch(format!("patch must end with `{END_SENTINEL}`")));
    }

    let body = &lines[1..lines.len() - 1];
    let mut ops = Vec::new();
    let mut idx = 0usize;

    while idx < body.len() {
        let line = body[idx];
        if let Some(path) = line.strip_prefix(ADD_PREFIX) {
            idx += 1;
            let mut content_lines = Vec::new();
            while idx < body.len() {
                let Some(content) = body[idx].strip_prefix('+') else {
                    break;
                };
                content_lines.push(content.to_string());
                idx += 1;
            }
            let mut content = content_lines.join("\n");
            if !content_lines.is_empty() {
                content.push('\n');
            }
            ops.push(PatchOp::Add { path: require_path(path)?, content });
        } else if let Some(path) = line.strip_prefix(DELETE_PREFIX) {
            idx += 1;
            ops.push(PatchOp::Delete { path: require_path(path)? });
        } else if let Some(path) = line.strip_prefix(UPDATE_PREFIX) {
            idx += 1;
            let move_to = if idx < body.len() {
                body[idx].strip_prefix(MOVE_PREFIX).map(|dest| {
                    idx += 1;
                    dest.trim().to_string()
                })
            } else {
                None
            };
            let chunks = parse_chunks(body, &mut idx)?;
            if chunks.is_empty() {
                return Err(ToolError::InvalidPatch(format!("update for {path} has no chunks")));
            }
            ops.push(PatchOp::Update { path: require_path(path)?, move_to, chunks });
        } else {
            return Err(ToolError::InvalidPatch(format!("unexpected line in patch: {line}")));
        }
    }

    if ops.is_empty() {
        return Err(ToolError::InvalidPatch("patch contains no operations".to_string()));
    }
    Ok(ops)
}

fn require_path(raw: &str) -> Result<String, ToolError> {
    let path = raw.trim();
    if path.is_empty() {
        return Err(ToolError::InvalidPatch("operation is missing a path".to_string()));
    }
    Ok(path.to_string())
}

/// Parse consecutive `@@` chunks of one update operation.
fn parse_chunks(body: &[&str], idx: &mut usize) -> Result<Vec<Chunk>, ToolError> {
    let mut chunks: Vec<Chunk> = Vec::new();

    while *idx < body.len() {
        let line = body[*idx];
        if let Some(rest) = line.strip_prefix("@@") {
            let hint = rest.trim();
            chunks.push(Chunk {
                context_hint: (!hint.is_empty()).then(|| hint.to_string()),
                ..Chunk::default()
            });
            *idx += 1;
            continue;
        }
        if line == EOF_SENTINEL {
            let Some(chunk) = chunks.last_mut() else {
                return Err(ToolError::InvalidPatch(
                    "`*** End of File` before any chunk".to_string(),
                ));
            };
            chunk.is_eof = true;
            *idx += 1;
            continue;
        }
        if line.starts_with("*** ") {
            // Next operation; the caller resumes here.
            break;
        }

        let Some(chunk) = chunks.last_mut() else {
            return Err(ToolError::InvalidPatch(format!(
                "chunk line before any `@@` marker: {line}"
            )));
        };
        if let Some(rest) = line.strip_prefix('+') {
            chunk.new_lines.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            chunk.old_lines.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix(' ') {
            chunk.old_lines.push(rest.to_string());
            chunk.new_lines.push(rest.to_string());
        } else if line.is_empty() {
            // A fully blank line stands for an empty context line.
            chunk.old_lines.push(String::new());
            chunk.new_lines.push(String::new());
        } else {
            return Err(ToolError::InvalidPatch(format!("unrecognized chunk line: {line}")));
        }
        *idx += 1;
    }

    Ok(chunks)
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchPass {
    Exact,
    TrimEnd,
    TrimBoth,
}

fn lines_equal(a: &str, b: &str, pass: MatchPass) -> bool {
    match pass {
        MatchPass::Exact => a == b,
        MatchPass::TrimEnd => a.trim_end() == b.trim_end(),
        MatchPass::TrimBoth => a.trim() == b.trim(),
    }
}

fn window_matches(lines: &[String], old: &[String], start: usize, pass: MatchPass) -> bool {
    if start + old.len() > lines.len() {
        return false;
    }
    old.iter()
        .enumerate()
        .all(|(i, expected)| lines_equal(&lines[start + i], expected, pass))
}

/// Find the chunk's old-line window at or after `cursor`.
///
/// An EOF-marked chunk prefers the window ending at the last line; every
/// chunk otherwise searches forward, trying the whole range exactly before
/// falling back to the whitespace-tolerant passes.
fn locate_window(lines: &[String], old: &[String], cursor: usize, is_eof: bool) -> Option<usize> {
    let passes = [MatchPass::Exact, MatchPass::TrimEnd, MatchPass::TrimBoth];

    if is_eof && lines.len() >= old.len() {
        let start = lines.len() - old.len();
        if start >= cursor {
            for pass in passes {
                if window_matches(lines, old, start, pass) {
                    return Some(start);
                }
            }
        }
    }

    let last_start = lines.len().checked_sub(old.len())?;
    for pass in passes {
        for start in cursor..=last_start {
            if window_matches(lines, old, start, pass) {
                return Some(start);
            }
        }
    }
    None
}

/// Apply every chunk of one update to the source line list.
fn apply_chunks(source: &str, chunks: &[Chunk], path: &str) -> Result<String, ToolError> {
    let mut lines: Vec<String> = source.split('\n').map(str::to_string).collect();
    let mut cursor = 0usize;

    for chunk in chunks {
        if let Some(hint) = &chunk.context_hint {
            let found = (cursor..lines.len())
                .find(|&i| lines_equal(&lines[i], hint, MatchPass::TrimBoth))
                .ok_or_else(|| {
                    ToolError::PatchConflict(format!("{path}: context `{hint}` not found"))
                })?;
            cursor = found + 1;
        }

        let start = locate_window(&lines, &chunk.old_lines, cursor, chunk.is_eof)
            .ok_or_else(|| {
                ToolError::PatchConflict(format!(
                    "{path}: chunk does not match the file at or after line {}",
                    cursor + 1
                ))
            })?;

        lines.splice(start..start + chunk.old_lines.len(), chunk.new_lines.iter().cloned());
        cursor = start + chunk.new_lines.len();
    }

    Ok(lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Apply one patch envelope against the sandbox.
pub async fn run(sandbox: &Sandbox, arguments: &str) -> Result<Value, ToolError> {
    let args: Args =
        serde_json::from_str(arguments).map_err(|e| ToolError::InvalidPayload(e.to_string()))?;

    let base = resolve_workdir(sandbox, args.workdir.as_deref())?;
    let ops = parse_patch(&args.input)?;

    let mut changes = Vec::with_capacity(ops.len());
    for op in &ops {
        changes.push(apply_op(sandbox, &base, op).await?);
    }

    Ok(json!({
        "status": "success",
        "files_changed": changes.len(),
        "changes": changes,
    }))
}

fn resolve_workdir(sandbox: &Sandbox, workdir: Option<&str>) -> Result<PathBuf, ToolError> {
    let Some(workdir) = workdir else {
        return Ok(sandbox.root().to_path_buf());
    };
    let path = Path::new(workdir);
    let base = if path.is_absolute() {
        path.to_path_buf()
    } else {
        sandbox.root().join(path)
    };
    if !sandbox.within(&base) {
        return Err(ToolError::PathOutsideSandbox(workdir.to_string()));
    }
    Ok(base)
}

/// Resolve one operation path against the base, enforcing containment.
fn resolve_target(sandbox: &Sandbox, base: &Path, rel: &str) -> Result<PathBuf, ToolError> {
    if Path::new(rel).is_absolute() {
        return Err(ToolError::AbsolutePathForbidden(rel.to_string()));
    }
    let target = base.join(rel);
    if !sandbox.within(&target) {
        return Err(ToolError::PathOutsideSandbox(rel.to_string()));
    }
    Ok(target)
}

async fn apply_op(sandbox: &Sandbox, base: &Path, op: &PatchOp) -> Result<Value, ToolError> {
    match op {
        PatchOp::Add { path, content } => {
            let target = resolve_target(sandbox, base, path)?;
            if target.exists() {
                return Err(ToolError::PatchConflict(format!("{path}: file already exists")));
            }
            create_parents(&target).await?;
            tokio::fs::write(&target, content).await.map_err(ToolError::from)?;
            Ok(json!({
                "path": path,
                "workspace_path": sandbox.display_relative(&target),
                "kind": "add",
            }))
        }
        PatchOp::Delete { path } => {
            let target = resolve_target(sandbox, base, path)?;
            if !target.exists() {
                return Err(ToolError::PatchConflict(format!("{path}: file does not exist")));
            }
            tokio::fs::remove_file(&target).await.map_err(ToolError::from)?;
            Ok(json!({
                "path": path,
                "workspace_path": sandbox.display_relative(&target),
                "kind": "delete",
            }))
        }
        PatchOp::Update { path, move_to, chunks } => {
            let source_path = resolve_target(sandbox, base, path)?;
            let metadata = tokio::fs::metadata(&source_path)
                .await
                .map_err(|_| ToolError::PatchConflict(format!("{path}: file does not exist")))?;
            if metadata.len() > MAX_SOURCE_BYTES {
                return Err(ToolError::IoFailure(format!(
                    "{path}: file exceeds {MAX_SOURCE_BYTES} bytes"
                )));
            }

            let source = tokio::fs::read_to_string(&source_path)
                .await
                .map_err(|e| ToolError::IoFailure(format!("{path}: {e}")))?;
            let merged = apply_chunks(&source, chunks, path)?;

            let dest_path = match move_to {
                Some(dest) => resolve_target(sandbox, base, dest)?,
                None => source_path.clone(),
            };
            create_parents(&dest_path).await?;
            tokio::fs::write(&dest_path, merged).await.map_err(ToolError::from)?;

            if dest_path != source_path {
                tokio::fs::remove_file(&source_path).await.map_err(|_| {
                    ToolError::PatchConflict(format!("{path}: vanished during move"))
                })?;
            }

            let mut change = json!({
                "path": path,
                "workspace_path": sandbox.display_relative(&dest_path),
                "kind": "update",
            });
            if let Some(dest) = move_to {
                change["move_to"] = json!(dest);
            }
            Ok(change)
        }
    }
}

async fn create_parents(target: &Path) -> Result<(), ToolError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(ToolError::from)?;
    }
    Ok(())
}
