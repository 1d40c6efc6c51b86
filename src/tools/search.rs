//! Text and AST search over workspace files.
//!
//! The tool shells out to ripgrep (`rg --json`) or ast-grep (`sg run
//! --json=stream`), parses their JSON-lines output, and enriches each match
//! with surrounding context lines read back from the source file. Child
//! output is capped at 512 KiB; a child that exceeds the cap is killed.

use crate::error::ToolError;
use crate::sandbox::Sandbox;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Cap on captured stdout/stderr bytes from either engine.
const MAX_CHILD_OUTPUT: usize = 512 * 1024;
const MAX_PATHS: usize = 16;
const MAX_GLOBS: usize = 32;
const MAX_CONTEXT: usize = 10;
const MAX_LIMIT: usize = 2000;
const DEFAULT_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum Engine {
    #[default]
    Ripgrep,
    AstGrep,
}

impl Engine {
    fn name(self) -> &'static str {
        match self {
            Self::Ripgrep => "ripgrep",
            Self::AstGrep => "ast-grep",
        }
    }
}

#[derive(Debug, Deserialize)]
struct Args {
    pattern: String,
    #[serde(default)]
    engine: Engine,
    #[serde(default)]
    paths: Vec<String>,
    #[serde(default)]
    include_globs: Vec<String>,
    #[serde(default)]
    exclude_globs: Vec<String>,
    #[serde(default = "default_true")]
    case_sensitive: bool,
    /// Treat the pattern as a regex (ripgrep only; default literal).
    #[serde(default)]
    regex: bool,
    #[serde(default)]
    context_before: usize,
    #[serde(default)]
    context_after: usize,
    limit: Option<usize>,
    ast_language: Option<String>,
}

fn default_true() -> bool {
    true
}

/// JSON Schema for the arguments object.
pub fn parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "pattern": {
                "type": "string",
                "description": "Text, regex, or ast-grep pattern to search for."
            },
            "engine": {
                "type": "string",
                "enum": ["ripgrep", "ast-grep"],
                "description": "Search engine (default ripgrep)."
            },
            "paths": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Files or directories to search (max 16; default workspace root)."
            },
            "include_globs": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Only search files matching these globs (max 32)."
            },
            "exclude_globs": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Skip files matching these globs (max 32)."
            },
            "case_sensitive": {
                "type": "boolean",
                "description": "Case-sensitive matching (default true)."
            },
            "regex": {
                "type": "boolean",
                "description": "Treat the pattern as a regex instead of a literal (ripgrep only)."
            },
            "context_before": {
                "type": "integer",
                "description": "Context lines before each match (0-10)."
            },
            "context_after": {
                "type": "integer",
                "description": "Context lines after each match (0-10)."
            },
            "limit": {
                "type": "integer",
                "description": "Maximum matches to return (1-2000, default 200)."
            },
            "ast_language": {
                "type": "string",
                "description": "Language hint for ast-grep (e.g. rust, python)."
            }
        },
        "required": ["pattern"]
    })
}

/// Summary formatter reading the success payload.
pub fn summarize(value: &Value) -> Option<String> {
    let stats = value.get("stats")?;
    super::count_summary(
        &json!({"matches": stats.get("matches"), "truncated": value.get("truncated")}),
        "matches",
        "match",
        "matches",
    )
}

/// One match produced by either engine.
#[derive(Debug, PartialEq, Eq)]
struct MatchRecord {
    /// Absolute path as reported by the engine.
    absolute_path: PathBuf,
    /// 1-based line of the match.
    line: usize,
    /// 1-based column of the match.
    column: usize,
    /// Matched text.
    matched: String,
    /// Full source line, trailing newline trimmed.
    line_text: String,
}

/// Run one search inside the sandbox.
pub async fn run(sandbox: &Sandbox, arguments: &str) -> Result<Value, ToolError> {
    let args: Args =
        serde_json::from_str(arguments).map_err(|e| ToolError::InvalidPayload(e.to_string()))?;
    validate(&args)?;

    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);

    let mut roots = Vec::new();
    if args.paths.is_empty() {
        roots.push(sandbox.root().to_path_buf());
    } else {
        for path in &args.paths {
            roots.push(sandbox.resolve(path)?);
        }
    }

    let (stdout, stderr) = match args.engine {
        Engine::Ripgrep => {
            let argv = ripgrep_argv(&args, &roots);
            run_engine("rg", &argv, None).await?
        }
        Engine::AstGrep => {
            let argv = ast_grep_argv(&args, &roots);
            // Distributions ship the binary as `sg` or `ast-grep`.
            run_engine("sg", &argv, Some("ast-grep")).await?
        }
    };

    let mut records = match args.engine {
        Engine::Ripgrep => parse_ripgrep_output(&stdout, limit),
        Engine::AstGrep => parse_ast_grep_output(&stdout, limit),
    }?;
    let truncated = records.len() > limit;
    records.truncate(limit);

    let mut results = Vec::with_capacity(records.len());
    for record in &records {
        let mut entry = json!({
            "path": sandbox.display_relative(&record.absolute_path),
            "line": record.line,
            "column": record.column,
            "match": record.matched,
            "line_text": record.line_text,
        });
        if args.context_before > 0 || args.context_after > 0 {
            let (before, after) = gather_context(
                &record.absolute_path,
                record.line,
                args.context_before,
                args.context_after,
            )
            .await?;
            entry["context_before"] = json!(before);
            entry["context_after"] = json!(after);
        }
        results.push(entry);
    }

    let mut envelope = json!({
        "engine": args.engine.name(),
        "results": results,
        "truncated": truncated,
        "stats": {"matches": records.len()},
    });
    let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
    if !stderr.is_empty() {
        envelope["notes"] = json!([stderr]);
    }
    Ok(envelope)
}

fn validate(args: &Args) -> Result<(), ToolError> {
    if args.pattern.is_empty() {
        return Err(ToolError::InvalidPayload("pattern must not be empty".to_string()));
    }
    if args.paths.len() > MAX_PATHS {
        return Err(ToolError::InvalidPayload(format!("at most {MAX_PATHS} paths")));
    }
    if args.include_globs.len() > MAX_GLOBS || args.exclude_globs.len() > MAX_GLOBS {
        return Err(ToolError::InvalidPayload(format!("at most {MAX_GLOBS} globs per list")));
    }
    if args.context_before > MAX_CONTEXT || args.context_after > MAX_CONTEXT {
        return Err(ToolError::InvalidPayload(format!("context lines capped at {MAX_CONTEXT}")));
    }
    if let Some(limit) = args.limit {
        if limit == 0 || limit > MAX_LIMIT {
            return Err(ToolError::InvalidPayload(format!("limit must be 1-{MAX_LIMIT}")));
        }
    }
    Ok(())
}

/// Build the ripgrep argument vector.
fn ripgrep_argv(args: &Args, roots: &[PathBuf]) -> Vec<String> {
    let mut argv = vec![
        "--json".to_string(),
        "--color=never".to_string(),
        "--line-number".to_string(),
        "--column".to_string(),
        "--no-heading".to_string(),
        "--with-filename".to_string(),
    ];
    if !args.case_sensitive {
        argv.push("--ignore-case".to_string());
    }
    if !args.regex {
        argv.push("--fixed-strings".to_string());
    }
    for glob in &args.include_globs {
        argv.push("--glob".to_string());
        argv.push(glob.clone());
    }
    for glob in &args.exclude_globs {
        argv.push("--glob".to_string());
        argv.push(format!("!{glob}"));
    }
    argv.push("-e".to_string());
    argv.push(args.pattern.clone());
    argv.push("--".to_string());
    for root in roots {
        argv.push(root.display().to_string());
    }
    argv
}

/// Build the ast-grep argument vector.
fn ast_grep_argv(args: &Args, roots: &[PathBuf]) -> Vec<String> {
    let mut argv = vec![
        "run".to_string(),
        "--json=stream".to_string(),
        "-p".to_string(),
        args.pattern.clone(),
    ];
    if let Some(lang) = &args.ast_language {
        argv.push("--lang".to_string());
        argv.push(lang.clone());
    }
    for glob in &args.include_globs {
        argv.push("--globs".to_string());
        argv.push(glob.clone());
    }
    for glob in &args.exclude_globs {
        argv.push("--globs".to_string());
        argv.push(format!("!{glob}"));
    }
    for root in roots {
        argv.push(root.display().to_string());
    }
    argv
}

/// Spawn one engine process and capture its output under the byte cap.
///
/// Exit code 1 is "no matches" for both engines; 2 and above is a hard
/// failure surfaced with trimmed stderr.
async fn run_engine(
    binary: &str,
    argv: &[String],
    fallback_binary: Option<&str>,
) -> Result<(Vec<u8>, Vec<u8>), ToolError> {
    let child = match spawn(binary, argv) {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let Some(fallback) = fallback_binary else {
                return Err(ToolError::BinaryUnavailable(binary.to_string()));
            };
            match spawn(fallback, argv) {
                Ok(child) => child,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ToolError::BinaryUnavailable(format!("{binary} / {fallback}")))
                }
                Err(e) => return Err(ToolError::CommandFailed(format!("{fallback}: {e}"))),
            }
        }
        Err(e) => return Err(ToolError::CommandFailed(format!("{binary}: {e}"))),
    };

    collect_child_output(child, binary).await
}

fn spawn(binary: &str, argv: &[String]) -> Result<tokio::process::Child, std::io::Error> {
    Command::new(binary)
        .args(argv)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // The child must not outlive a cancelled or failed tool future.
        .kill_on_drop(true)
        .spawn()
}

async fn collect_child_output(
    mut child: tokio::process::Child,
    binary: &str,
) -> Result<(Vec<u8>, Vec<u8>), ToolError> {
    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| ToolError::CommandFailed(format!("{binary}: missing stdout")))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| ToolError::CommandFailed(format!("{binary}: missing stderr")))?;

    let cap = MAX_CHILD_OUTPUT as u64;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut stdout_limited = (&mut stdout_pipe).take(cap + 1);
    let mut stderr_limited = (&mut stderr_pipe).take(cap + 1);
    let stdout_read = stdout_limited.read_to_end(&mut stdout);
    let stderr_read = stderr_limited.read_to_end(&mut stderr);
    let (out_res, err_res) = tokio::join!(stdout_read, stderr_read);
    out_res.map_err(|e| ToolError::CommandFailed(format!("{binary}: {e}")))?;
    err_res.map_err(|e| ToolError::CommandFailed(format!("{binary}: {e}")))?;

    if stdout.len() > MAX_CHILD_OUTPUT || stderr.len() > MAX_CHILD_OUTPUT {
        // Closing the pipes on drop signals the child; kill to be prompt.
        let _ = child.kill().await;
        return Err(ToolError::ToolLimitExceeded(format!(
            "{binary} output exceeds {MAX_CHILD_OUTPUT} bytes"
        )));
    }

    let status = child
        .wait()
        .await
        .map_err(|e| ToolError::CommandFailed(format!("{binary}: {e}")))?;
    let code = status.code().unwrap_or(-1);
    if code >= 2 || code < 0 {
        let detail = String::from_utf8_lossy(&stderr).trim().to_string();
        let detail = if detail.is_empty() {
            format!("exit code {code}")
        } else {
            detail
        };
        return Err(ToolError::CommandFailed(format!("{binary}: {detail}")));
    }

    Ok((stdout, stderr))
}

/// Parse `rg --json` lines, keeping one record per submatch.
///
/// Collection stops after `limit + 1` records: the extra one only marks
/// truncation.
fn parse_ripgrep_output(stdout: &[u8], limit: usize) -> Result<Vec<MatchRecord>, ToolError> {
    let mut records = Vec::new();
    for line in stdout.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_slice::<Value>(line) else {
            continue;
        };
        if value.get("type").and_then(Value::as_str) != Some("match") {
            continue;
        }
        let Some(data) = value.get("data") else {
            continue;
        };
        let path = data
            .pointer("/path/text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let line_number = data
            .get("line_number")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let line_text = data
            .pointer("/lines/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim_end_matches('\n')
            .trim_end_matches('\r')
            .to_string();
        let Some(submatches) = data.get("submatches").and_then(Value::as_array) else {
            continue;
        };
        for submatch in submatches {
            let start = submatch.get("start").and_then(Value::as_u64).unwrap_or(0) as usize;
            let matched = submatch
                .pointer("/match/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            records.push(MatchRecord {
                absolute_path: PathBuf::from(path),
                line: line_number,
                column: start + 1,
                matched,
                line_text: line_text.clone(),
            });
            if records.len() > limit {
                return Ok(records);
            }
        }
    }
    Ok(records)
}

/// Parse `sg run --json=stream` lines.
fn parse_ast_grep_output(stdout: &[u8], limit: usize) -> Result<Vec<MatchRecord>, ToolError> {
    let mut records = Vec::new();
    for line in stdout.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_slice::<Value>(line) else {
            continue;
        };
        let Some(file) = value.get("file").and_then(Value::as_str) else {
            continue;
        };
        let line_number = value
            .pointer("/range/start/line")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
            + 1;
        let column = value
            .pointer("/range/start/column")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize
            + 1;
        let text = value
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        // ast-grep omits `lines` for some node kinds; the matched text is
        // the documented fallback.
        let line_text = value
            .get("lines")
            .and_then(Value::as_str)
            .unwrap_or(&text)
            .trim_end_matches('\n')
            .trim_end_matches('\r')
            .to_string();
        records.push(MatchRecord {
            absolute_path: PathBuf::from(file),
            line: line_number,
            column,
            matched: text,
            line_text,
        });
        if records.len() > limit {
            break;
        }
    }
    Ok(records)
}

/// Re-open the matched file and pull surrounding lines.
async fn gather_context(
    path: &Path,
    line: usize,
    before: usize,
    after: usize,
) -> Result<(Vec<String>, Vec<String>), ToolError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ToolError::PathNotFound(path.display().to_string()),
        std::io::ErrorKind::PermissionDenied => {
            ToolError::PermissionDenied(path.display().to_string())
        }
        _ => ToolError::IoFailure(format!("{}: {e}", path.display())),
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().collect();
    if line == 0 || line > lines.len() {
        return Ok((Vec::new(), Vec::new()));
    }
    let idx = line - 1;
    let start = idx.saturating_sub(before);
    let end = (idx + 1 + after).min(lines.len());
    let before_lines = lines[start..idx].iter().map(|l| l.to_string()).collect();
    let after_lines = lines[idx + 1..end].iter().map(|l| l.to_string()).collect();
    Ok((before_lines, after_lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxMode;
    use crate::testsupport::TestTempDir;

    fn base_args(pattern: &str) -> Args {
        serde_json::from_str(&format!(r#"{{"pattern": {pattern:?}}}"#)).unwrap()
    }

    // --- argv construction ---

    #[test]
    fn ripgrep_argv_defaults_to_literal_case_sensitive() {
        let args = base_args("needle");
        let argv = ripgrep_argv(&args, &[PathBuf::from("/sbx")]);
        assert!(argv.contains(&"--json".to_string()));
        assert!(argv.contains(&"--fixed-strings".to_string()));
        assert!(!argv.contains(&"--ignore-case".to_string()));
        let sep = argv.iter().position(|a| a == "--").unwrap();
        assert_eq!(argv[sep - 2], "-e");
        assert_eq!(argv[sep - 1], "needle");
        assert_eq!(argv[sep + 1], "/sbx");
    }

    #[test]
    fn ripgrep_argv_honors_regex_case_and_globs() {
        let args: Args = serde_json::from_str(
            r#"{"pattern": "a.*b", "regex": true, "case_sensitive": false,
                "include_globs": ["*.rs"], "exclude_globs": ["target/**"]}"#,
        )
        .unwrap();
        let argv = ripgrep_argv(&args, &[PathBuf::from("/sbx")]);
        assert!(!argv.contains(&"--fixed-strings".to_string()));
        assert!(argv.contains(&"--ignore-case".to_string()));
        let globs: Vec<&String> = argv
            .iter()
            .enumerate()
            .filter(|(i, a)| *a == "--glob" && *i + 1 < argv.len())
            .map(|(i, _)| &argv[i + 1])
            .collect();
        assert_eq!(globs, ["*.rs", "!target/**"]);
    }

    #[test]
    fn ast_grep_argv_shape() {
        let args: Args = serde_json::from_str(
            r#"{"pattern": "foo($A)", "engine": "ast-grep", "ast_language": "rust"}"#,
        )
        .unwrap();
        let argv = ast_grep_argv(&args, &[PathBuf::from("/sbx")]);
        assert_eq!(argv[0], "run");
        assert_eq!(argv[1], "--json=stream");
        assert_eq!(argv[2], "-p");
        assert_eq!(argv[3], "foo($A)");
        assert!(argv.contains(&"--lang".to_string()));
        assert!(argv.contains(&"rust".to_string()));
        assert_eq!(argv.last().unwrap(), "/sbx");
    }

    // --- validation ---

    #[test]
    fn validation_rejects_out_of_range_parameters() {
        let empty = base_args("");
        assert!(matches!(validate(&empty), Err(ToolError::InvalidPayload(_))));

        let mut too_many_paths = base_args("x");
        too_many_paths.paths = (0..17).map(|i| format!("p{i}")).collect();
        assert!(validate(&too_many_paths).is_err());

        let mut deep_context = base_args("x");
        deep_context.context_before = 11;
        assert!(validate(&deep_context).is_err());

        let mut zero_limit = base_args("x");
        zero_limit.limit = Some(0);
        assert!(validate(&zero_limit).is_err());

        let mut big_limit = base_args("x");
        big_limit.limit = Some(2001);
        assert!(validate(&big_limit).is_err());
    }

    // --- output parsing ---

    #[test]
    fn ripgrep_match_lines_become_records() {
        let stdout = concat!(
            r#"{"type":"begin","data":{"path":{"text":"/sbx/a.rs"}}}"#,
            "\n",
            r#"{"type":"match","data":{"path":{"text":"/sbx/a.rs"},"line_number":3,"lines":{"text":"let needle = 1;\n"},"submatches":[{"match":{"text":"needle"},"start":4,"end":10}]}}"#,
            "\n",
            r#"{"type":"end","data":{}}"#,
            "\n"
        );
        let records = parse_ripgrep_output(stdout.as_bytes(), 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].absolute_path, PathBuf::from("/sbx/a.rs"));
        assert_eq!(records[0].line, 3);
        assert_eq!(records[0].column, 5);
        assert_eq!(records[0].matched, "needle");
        assert_eq!(records[0].line_text, "let needle = 1;");
    }

    #[test]
    fn ripgrep_multiple_submatches_emit_multiple_records() {
        let stdout = concat!(
            r#"{"type":"match","data":{"path":{"text":"/sbx/a.rs"},"line_number":1,"lines":{"text":"x x\n"},"submatches":[{"match":{"text":"x"},"start":0,"end":1},{"match":{"text":"x"},"start":2,"end":3}]}}"#,
            "\n"
        );
        let records = parse_ripgrep_output(stdout.as_bytes(), 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].column, 1);
        assert_eq!(records[1].column, 3);
    }

    #[test]
    fn ripgrep_collection_halts_just_past_the_limit() {
        let mut stdout = String::new();
        for i in 0..50 {
            stdout.push_str(&format!(
                r#"{{"type":"match","data":{{"path":{{"text":"/sbx/f"}},"line_number":{},"lines":{{"text":"y\n"}},"submatches":[{{"match":{{"text":"y"}},"start":0,"end":1}}]}}}}"#,
                i + 1
            ));
            stdout.push('\n');
        }
        let records = parse_ripgrep_output(stdout.as_bytes(), 5).unwrap();
        assert_eq!(records.len(), 6, "one extra record marks truncation");
    }

    #[test]
    fn ast_grep_lines_fall_back_to_text() {
        let stdout = concat!(
            r#"{"file":"/sbx/a.rs","text":"foo(1)","range":{"start":{"line":2,"column":4},"end":{"line":2,"column":10}}}"#,
            "\n",
            r#"{"file":"/sbx/b.rs","text":"foo(2)","lines":"let y = foo(2);","range":{"start":{"line":0,"column":8},"end":{"line":0,"column":14}}}"#,
            "\n"
        );
        let records = parse_ast_grep_output(stdout.as_bytes(), 10).unwrap();
        assert_eq!(records.len(), 2);
        // 0-based line/column are shifted to 1-based.
        assert_eq!(records[0].line, 3);
        assert_eq!(records[0].column, 5);
        // `lines` missing: the matched text stands in.
        assert_eq!(records[0].line_text, "foo(1)");
        assert_eq!(records[1].line_text, "let y = foo(2);");
    }

    #[test]
    fn junk_lines_are_skipped_by_both_parsers() {
        let stdout = b"not json\n{\"type\":\"summary\"}\n";
        assert!(parse_ripgrep_output(stdout, 10).unwrap().is_empty());
        assert!(parse_ast_grep_output(stdout, 10).unwrap().is_empty());
    }

    // --- context gathering ---

    #[tokio::test]
    async fn context_lines_surround_the_match() {
        let fixture = TestTempDir::new("search-context");
        let path = fixture.write_text("a.txt", "one\ntwo\nthree\nfour\nfive\n");
        let (before, after) = gather_context(&path, 3, 2, 1).await.unwrap();
        assert_eq!(before, ["one", "two"]);
        assert_eq!(after, ["four"]);
    }

    #[tokio::test]
    async fn context_is_clamped_at_file_edges() {
        let fixture = TestTempDir::new("search-context-edge");
        let path = fixture.write_text("a.txt", "one\ntwo\n");
        let (before, after) = gather_context(&path, 1, 5, 5).await.unwrap();
        assert!(before.is_empty());
        assert_eq!(after, ["two"]);
    }

    #[tokio::test]
    async fn context_for_a_missing_file_is_path_not_found() {
        let err = gather_context(Path::new("/definitely/not/here"), 1, 1, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PathNotFound(_)));
    }

    // --- end-to-end against a real ripgrep, when present ---

    fn rg_available() -> bool {
        std::process::Command::new("rg")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn ripgrep_end_to_end_finds_matches_with_relative_paths() {
        if !rg_available() {
            return;
        }
        let fixture = TestTempDir::new("search-e2e");
        fixture.write_text("src/lib.rs", "fn alpha() {}\nfn beta() { alpha(); }\n");
        let sandbox = Sandbox::new(fixture.path(), SandboxMode::ReadOnly).unwrap();

        let result = run(&sandbox, r#"{"pattern": "alpha", "context_after": 1}"#)
            .await
            .unwrap();
        assert_eq!(result["engine"], "ripgrep");
        assert_eq!(result["stats"]["matches"], 2);
        let first = &result["results"][0];
        assert_eq!(first["path"], "src/lib.rs");
        assert_eq!(first["line"], 1);
        assert!(first["line_text"].as_str().unwrap().contains("alpha"));
    }

    #[tokio::test]
    async fn ripgrep_end_to_end_no_matches_is_success() {
        if !rg_available() {
            return;
        }
        let fixture = TestTempDir::new("search-e2e-none");
        fixture.write_text("a.txt", "nothing here\n");
        let sandbox = Sandbox::new(fixture.path(), SandboxMode::ReadOnly).unwrap();

        let result = run(&sandbox, r#"{"pattern": "zzz_absent"}"#).await.unwrap();
        assert_eq!(result["stats"]["matches"], 0);
        assert_eq!(result["truncated"], false);
    }

    #[tokio::test]
    async fn missing_engine_binary_is_reported_as_unavailable() {
        let err = run_engine("definitely-not-a-real-binary-xyz", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::BinaryUnavailable(_)));
    }
}
