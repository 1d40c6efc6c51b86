//! File reading tool: plain line slices and indentation-anchored
//! structural slices.
//!
//! Slice mode is a line-range window. Indentation mode grows outward from an
//! anchor line while the indentation stays within a computed floor, so the
//! model can pull "the enclosing block plus its header comment" without a
//! syntax tree.

use crate::error::ToolError;
use crate::sandbox::Sandbox;
use crate::textutil::truncate_by_chars;
use serde::Deserialize;
use serde_json::{json, Value};

/// Hard cap on lines returned by either mode.
const HARD_LINE_CAP: usize = 4000;
/// Default `limit` when the model omits one.
const DEFAULT_LIMIT: usize = 2000;
/// Rendered lines are cut at this many Unicode code points.
const MAX_LINE_LENGTH: usize = 500;
/// A tab advances the indent measure by this much.
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Mode {
    #[default]
    Slice,
    Indentation,
}

#[derive(Debug, Deserialize)]
struct Args {
    file_path: String,
    #[serde(default)]
    mode: Mode,
    /// 1-based first line for slice mode; default anchor for indentation mode.
    offset: Option<usize>,
    limit: Option<usize>,
    /// Indentation mode: 1-based anchor line. Defaults to `offset`.
    anchor_line: Option<usize>,
    /// Indentation mode: levels of upward context. 0 means unbounded.
    #[serde(default)]
    max_levels: usize,
    /// Indentation mode: admit sibling statements at the indent floor.
    #[serde(default)]
    include_siblings: bool,
    /// Indentation mode: admit header comments above the block.
    #[serde(default = "default_include_header")]
    include_header: bool,
    /// Indentation mode: additional output cap below `limit`.
    max_lines: Option<usize>,
}

fn default_include_header() -> bool {
    true
}

/// JSON Schema for the arguments object.
pub fn parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "file_path": {
                "type": "string",
                "description": "File to read, relative to the workspace root."
            },
            "mode": {
                "type": "string",
                "enum": ["slice", "indentation"],
                "description": "slice reads a line range; indentation slices the enclosing block around anchor_line."
            },
            "offset": {
                "type": "integer",
                "description": "1-based first line to read (slice mode), and the default anchor (indentation mode)."
            },
            "limit": {
                "type": "integer",
                "description": "Maximum lines to return (default 2000, cap 4000)."
            },
            "anchor_line": {
                "type": "integer",
                "description": "1-based anchor line for indentation mode."
            },
            "max_levels": {
                "type": "integer",
                "description": "Indentation levels of upward context to include; 0 means unbounded."
            },
            "include_siblings": {
                "type": "boolean",
                "description": "Admit sibling statements at the outermost included indent level."
            },
            "include_header": {
                "type": "boolean",
                "description": "Admit header comments (#, //, --) above the enclosing block (default true)."
            },
            "max_lines": {
                "type": "integer",
                "description": "Extra output cap for indentation mode."
            }
        },
        "required": ["file_path"]
    })
}

/// Summary formatter reading the success payload.
pub fn summarize(value: &Value) -> Option<String> {
    super::list_len_summary(value, "lines", "line", "lines")
}

/// One physical line with its indentation measures.
#[derive(Debug)]
struct LineRecord {
    /// 1-based line number.
    number: usize,
    /// Display text: invalid UTF-8 replaced, cut at the code-point cap.
    display: String,
    /// True when the line has no non-whitespace byte.
    blank: bool,
    /// Own indent for non-blank lines, inherited for blank ones.
    effective_indent: usize,
}

impl LineRecord {
    fn render(&self) -> String {
        format!("L{}: {}", self.number, self.display)
    }

    /// Header comments introduce the block above its opening line.
    fn is_header_comment(&self) -> bool {
        let trimmed = self.display.trim_start();
        trimmed.starts_with('#') || trimmed.starts_with("//") || trimmed.starts_with("--")
    }
}

/// Read a file inside the sandbox by slice or structural slice.
pub async fn run(sandbox: &Sandbox, arguments: &str) -> Result<Value, ToolError> {
    let args: Args =
        serde_json::from_str(arguments).map_err(|e| ToolError::InvalidPayload(e.to_string()))?;

    let path = sandbox.resolve(&args.file_path)?;
    if !path.is_file() {
        return Err(ToolError::PathNotFile(args.file_path.clone()));
    }

    let bytes = tokio::fs::read(&path).await.map_err(ToolError::from)?;
    let records = scan_lines(&bytes);

    let offset = args.offset.unwrap_or(1);
    if offset == 0 {
        return Err(ToolError::InvalidPayload("offset must be 1-based".to_string()));
    }
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, HARD_LINE_CAP);

    match args.mode {
        Mode::Slice => slice_mode(&records, offset, limit),
        Mode::Indentation => {
            let anchor = args.anchor_line.unwrap_or(offset);
            indentation_mode(
                &records,
                anchor,
                limit,
                args.max_levels,
                args.include_siblings,
                args.include_header,
                args.max_lines,
            )
        }
    }
}

/// Split file bytes into line records, computing effective indents.
fn scan_lines(bytes: &[u8]) -> Vec<LineRecord> {
    let mut records = Vec::new();
    let mut inherited_indent = 0usize;

    for (idx, raw) in bytes.split(|&b| b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let (indent, blank) = measure_indent(raw);
        let effective_indent = if blank {
            inherited_indent
        } else {
            inherited_indent = indent;
            indent
        };
        let display = truncate_by_chars(&String::from_utf8_lossy(raw), MAX_LINE_LENGTH);
        records.push(LineRecord {
            number: idx + 1,
            display,
            blank,
            effective_indent,
        });
    }

    // `split` yields one final empty piece when the file ends with \n;
    // that piece is not a line.
    if bytes.last() == Some(&b'\n') {
        records.pop();
    }
    if bytes.is_empty() {
        records.clear();
    }
    records
}

/// Count spaces as 1 and tabs as 4 up to the first non-whitespace byte.
fn measure_indent(raw: &[u8]) -> (usize, bool) {
    let mut indent = 0usize;
    for &byte in raw {
        match byte {
            b' ' => indent += 1,
            b'\t' => indent += TAB_WIDTH,
            _ => return (indent, false),
        }
    }
    (indent, true)
}

fn slice_mode(records: &[LineRecord], offset: usize, limit: usize) -> Result<Value, ToolError> {
    let total = records.len();
    if offset > total {
        return Err(ToolError::OffsetExceedsLength { offset, total });
    }

    let start = offset - 1;
    let end = (start + limit).min(total);
    let lines: Vec<String> = records[start..end].iter().map(LineRecord::render).collect();
    let truncated = end < total;

    Ok(json!({"mode": "slice", "lines": lines, "truncated": truncated}))
}

/// Which takes the upward scan still allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpwardState {
    /// Anything at or above the indent floor.
    Open,
    /// The floor-level sibling was spent; only header comments pass.
    HeadersOnly,
    Stopped,
}

#[allow(clippy::too_many_arguments)]
fn indentation_mode(
    records: &[LineRecord],
    anchor_line: usize,
    limit: usize,
    max_levels: usize,
    include_siblings: bool,
    include_header: bool,
    max_lines: Option<usize>,
) -> Result<Value, ToolError> {
    let total = records.len();
    if anchor_line == 0 {
        return Err(ToolError::InvalidPayload("anchor_line must be 1-based".to_string()));
    }
    if anchor_line > total {
        return Err(ToolError::AnchorExceedsLength { anchor: anchor_line, total });
    }

    let anchor = anchor_line - 1;
    let min_indent = if max_levels > 0 {
        records[anchor]
            .effective_indent
            .saturating_sub(max_levels * TAB_WIDTH)
    } else {
        0
    };

    let final_limit = limit.min(max_lines.unwrap_or(usize::MAX)).min(total).max(1);

    // Contiguous window [up, down] grown outward from the anchor, one step
    // per side per round. One sibling at exactly `min_indent` is admitted in
    // total: the upward side gets first claim on the budget, which leaves a
    // trailing sibling at the floor unadmitted.
    let mut up = anchor;
    let mut down = anchor;
    let mut count = 1usize;
    let mut sibling_budget: usize = 1;
    let mut up_state = UpwardState::Open;
    let mut down_open = true;

    loop {
        if count >= final_limit {
            break;
        }
        let mut progressed = false;

        if up_state != UpwardState::Stopped && up > 0 {
            let candidate = &records[up - 1];
            let take = if candidate.effective_indent < min_indent {
                up_state = UpwardState::Stopped;
                false
            } else if up_state == UpwardState::HeadersOnly {
                if include_header && candidate.is_header_comment() {
                    true
                } else {
                    up_state = UpwardState::Stopped;
                    false
                }
            } else if !include_siblings && candidate.effective_indent == min_indent {
                if include_header && candidate.is_header_comment() {
                    true
                } else if sibling_budget > 0 {
                    sibling_budget -= 1;
                    up_state = UpwardState::HeadersOnly;
                    true
                } else {
                    up_state = UpwardState::Stopped;
                    false
                }
            } else {
                true
            };
            if take {
                up -= 1;
                count += 1;
                progressed = true;
            }
        } else if up == 0 {
            up_state = UpwardState::Stopped;
        }

        if count >= final_limit {
            break;
        }

        if down_open && down + 1 < total {
            let candidate = &records[down + 1];
            let take = if candidate.effective_indent < min_indent {
                down_open = false;
                false
            } else if !include_siblings && candidate.effective_indent == min_indent {
                if sibling_budget > 0 {
                    sibling_budget -= 1;
                    down_open = false;
                    true
                } else {
                    down_open = false;
                    false
                }
            } else {
                true
            };
            if take {
                down += 1;
                count += 1;
                progressed = true;
            }
        } else if down + 1 >= total {
            down_open = false;
        }

        if !progressed {
            break;
        }
    }

    let cap_hit = count >= final_limit;
    let truncated = cap_hit
        && ((up_state != UpwardState::Stopped && up > 0) || (down_open && down + 1 < total));

    // Trim blank records from both edges of the window.
    let mut window = &records[up..=down];
    while let Some(first) = window.first() {
        if first.blank {
            window = &window[1..];
        } else {
            break;
        }
    }
    while let Some(last) = window.last() {
        if last.blank {
            window = &window[..window.len() - 1];
        } else {
            break;
        }
    }

    let lines: Vec<String> = window.iter().map(LineRecord::render).collect();
    Ok(json!({"mode": "indentation", "lines": lines, "truncated": truncated}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::SandboxMode;
    use crate::testsupport::TestTempDir;

    async fn read(content: &str, arguments: &str) -> Result<Value, ToolError> {
        let fixture = TestTempDir::new("read-file");
        fixture.write_text("a.txt", content);
        let sandbox = Sandbox::new(fixture.path(), SandboxMode::ReadOnly).unwrap();
        run(&sandbox, arguments).await
    }

    fn lines_of(value: &Value) -> Vec<String> {
        value["lines"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l.as_str().unwrap().to_string())
            .collect()
    }

    // --- slice mode ---

    #[tokio::test]
    async fn slice_returns_numbered_window_and_truncation_flag() {
        let result = read(
            "a\nb\nc\n",
            r#"{"file_path": "a.txt", "mode": "slice", "offset": 1, "limit": 2}"#,
        )
        .await
        .unwrap();
        assert_eq!(result["mode"], "slice");
        assert_eq!(lines_of(&result), ["L1: a", "L2: b"]);
        assert_eq!(result["truncated"], true);
    }

    #[tokio::test]
    async fn slice_of_the_full_file_is_not_truncated() {
        let result = read(
            "a\nb\nc\n",
            r#"{"file_path": "a.txt", "mode": "slice", "offset": 2, "limit": 10}"#,
        )
        .await
        .unwrap();
        assert_eq!(lines_of(&result), ["L2: b", "L3: c"]);
        assert_eq!(result["truncated"], false);
    }

    #[tokio::test]
    async fn slice_offset_past_eof_is_an_error() {
        let err = read(
            "a\nb\n",
            r#"{"file_path": "a.txt", "mode": "slice", "offset": 9}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ToolError::OffsetExceedsLength { offset: 9, total: 2 }
        ));
    }

    #[tokio::test]
    async fn slice_growing_limit_extends_the_same_prefix() {
        let content = "a\nb\nc\nd\n";
        let mut previous: Vec<String> = Vec::new();
        for limit in 1..=5 {
            let args =
                format!(r#"{{"file_path": "a.txt", "mode": "slice", "limit": {limit}}}"#);
            let result = read(content, &args).await.unwrap();
            let lines = lines_of(&result);
            assert!(lines.starts_with(&previous), "limit {limit} changed prefix");
            previous = lines;
        }
        assert_eq!(previous.len(), 4);
    }

    #[tokio::test]
    async fn slice_replaces_invalid_utf8_and_caps_line_length() {
        let fixture = TestTempDir::new("read-file-bytes");
        let mut bytes = b"ok \xFF end\n".to_vec();
        bytes.extend(vec![b'x'; 600]);
        bytes.push(b'\n');
        std::fs::write(fixture.child("a.txt"), bytes).unwrap();
        let sandbox = Sandbox::new(fixture.path(), SandboxMode::ReadOnly).unwrap();

        let result = run(&sandbox, r#"{"file_path": "a.txt", "mode": "slice"}"#)
            .await
            .unwrap();
        let lines = lines_of(&result);
        assert!(lines[0].contains('\u{FFFD}'), "got: {}", lines[0]);
        // "L2: " prefix plus 500 code points of x.
        assert_eq!(lines[1].chars().count(), 4 + 500);
    }

    #[tokio::test]
    async fn reading_a_directory_is_path_not_file() {
        let fixture = TestTempDir::new("read-file-dir");
        fixture.write_text("sub/x.txt", "x");
        let sandbox = Sandbox::new(fixture.path(), SandboxMode::ReadOnly).unwrap();
        let err = run(&sandbox, r#"{"file_path": "sub"}"#).await.unwrap_err();
        assert!(matches!(err, ToolError::PathNotFile(_)));
    }

    // --- indentation mode ---

    const PYISH: &str = "# header\nfoo():\n  bar()\n  baz()\nqux()\n";

    #[tokio::test]
    async fn indentation_keeps_header_and_drops_trailing_sibling() {
        let result = read(
            PYISH,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 3, "max_levels": 1, "include_siblings": false}"#,
        )
        .await
        .unwrap();
        assert_eq!(result["mode"], "indentation");
        assert_eq!(
            lines_of(&result),
            ["L1: # header", "L2: foo():", "L3:   bar()", "L4:   baz()"]
        );
        assert_eq!(result["truncated"], false);
    }

    #[tokio::test]
    async fn indentation_with_siblings_takes_the_whole_floor() {
        let result = read(
            PYISH,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 3, "include_siblings": true}"#,
        )
        .await
        .unwrap();
        assert_eq!(
            lines_of(&result),
            [
                "L1: # header",
                "L2: foo():",
                "L3:   bar()",
                "L4:   baz()",
                "L5: qux()"
            ]
        );
    }

    #[tokio::test]
    async fn indentation_header_can_be_disabled() {
        let result = read(
            PYISH,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 3, "max_levels": 1, "include_header": false}"#,
        )
        .await
        .unwrap();
        assert_eq!(
            lines_of(&result),
            ["L2: foo():", "L3:   bar()", "L4:   baz()"]
        );
    }

    #[tokio::test]
    async fn indentation_anchor_defaults_to_offset() {
        let result = read(
            PYISH,
            r#"{"file_path": "a.txt", "mode": "indentation", "offset": 3, "max_levels": 1}"#,
        )
        .await
        .unwrap();
        assert_eq!(
            lines_of(&result),
            ["L1: # header", "L2: foo():", "L3:   bar()", "L4:   baz()"]
        );
    }

    #[tokio::test]
    async fn indentation_anchor_past_eof_is_an_error() {
        let err = read(
            PYISH,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 42}"#,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ToolError::AnchorExceedsLength { anchor: 42, total: 5 }
        ));
    }

    #[tokio::test]
    async fn indentation_blank_lines_inherit_indent_and_edges_are_trimmed() {
        let content = "top()\n\nblock():\n  a()\n\n  b()\n\nnext()\n";
        let result = read(
            content,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 4, "max_levels": 1, "include_header": false}"#,
        )
        .await
        .unwrap();
        // The interior blank (L5) stays; the window never starts or ends on
        // a blank record.
        assert_eq!(
            lines_of(&result),
            ["L3: block():", "L4:   a()", "L5: ", "L6:   b()"]
        );
    }

    #[tokio::test]
    async fn indentation_max_lines_caps_and_marks_truncation() {
        let content = "def outer():\n  a()\n  b()\n  c()\n  d()\n";
        let result = read(
            content,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 3, "max_levels": 1, "max_lines": 2}"#,
        )
        .await
        .unwrap();
        assert_eq!(lines_of(&result).len(), 2);
        assert_eq!(result["truncated"], true);
    }

    #[tokio::test]
    async fn indentation_tabs_count_as_four() {
        let content = "fn main() {\n\tinner();\n\tmore();\n}\n";
        let result = read(
            content,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 2, "max_levels": 1, "include_header": false}"#,
        )
        .await
        .unwrap();
        assert_eq!(
            lines_of(&result),
            ["L1: fn main() {", "L2: \tinner();", "L3: \tmore();"]
        );
    }

    #[tokio::test]
    async fn indentation_unbounded_levels_reach_column_zero() {
        let content = "mod m {\n    fn f() {\n        body();\n    }\n}\n";
        let result = read(
            content,
            r#"{"file_path": "a.txt", "mode": "indentation", "anchor_line": 3, "max_levels": 0, "include_siblings": true}"#,
        )
        .await
        .unwrap();
        assert_eq!(lines_of(&result).len(), 5);
    }

    // --- unit tests for the measuring helpers ---

    #[test]
    fn measure_indent_mixes_spaces_and_tabs() {
        assert_eq!(measure_indent(b"    x"), (4, false));
        assert_eq!(measure_indent(b"\tx"), (4, false));
        assert_eq!(measure_indent(b" \t x"), (6, false));
        assert_eq!(measure_indent(b""), (0, true));
        assert_eq!(measure_indent(b"   "), (3, true));
    }

    #[test]
    fn scan_lines_counts_trailing_newline_correctly() {
        assert_eq!(scan_lines(b"a\nb\nc\n").len(), 3);
        assert_eq!(scan_lines(b"a\nb\nc").len(), 3);
        assert_eq!(scan_lines(b"").len(), 0);
        assert_eq!(scan_lines(b"\n").len(), 1);
    }

    #[test]
    fn header_comments_cover_hash_slash_and_dashes() {
        for text in ["# x", "  // x", "-- x"] {
            let record = LineRecord {
                number: 1,
                display: text.to_string(),
                blank: false,
                effective_indent: 0,
            };
            assert!(record.is_header_comment(), "{text}");
        }
    }
}
