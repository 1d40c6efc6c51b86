//! Incremental SSE decoder for streamed chat completions.
//!
//! The decoder consumes raw HTTP body chunks and produces three effects, in
//! stream order: visible text deltas written to the display writer (and
//! captured into the turn transcript), tool-call fragments forwarded to the
//! accumulator, and usage snapshots. Providers join multi-line `data:`
//! payloads with `\n` and terminate each event with a blank line; the
//! literal payload `[DONE]` ends the stream.

use crate::api::accumulator::ToolCallAccumulator;
use crate::error::ApiError;
use crate::types::{ToolCall, Usage};
use serde_json::Value;
use std::io::Write;

/// Cap on one event's joined payload. A single chat delta is far smaller;
/// anything bigger means the stream is corrupt.
const MAX_EVENT_BYTES: usize = 16 * 1024;
/// Inline capacity of the line buffer; lines at or under this never touch
/// the heap.
const INLINE_LINE_CAPACITY: usize = 512;

/// Line buffer that starts stack-allocated and spills to the heap.
///
/// Typical SSE lines fit the inline array, so the per-line hot path does no
/// allocation; an oversize line moves into the spill vector, whose capacity
/// is retained across lines.
struct LineBuffer {
    inline: [u8; INLINE_LINE_CAPACITY],
    len: usize,
    spill: Vec<u8>,
    spilled: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self {
            inline: [0; INLINE_LINE_CAPACITY],
            len: 0,
            spill: Vec::new(),
            spilled: false,
        }
    }
}

impl LineBuffer {
    fn push(&mut self, byte: u8) {
        if self.spilled {
            self.spill.push(byte);
        } else if self.len < INLINE_LINE_CAPACITY {
            self.inline[self.len] = byte;
            self.len += 1;
        } else {
            self.spill.clear();
            self.spill.extend_from_slice(&self.inline);
            self.spill.push(byte);
            self.spilled = true;
        }
    }

    fn as_slice(&self) -> &[u8] {
        if self.spilled {
            &self.spill
        } else {
            &self.inline[..self.len]
        }
    }

    fn clear(&mut self) {
        self.len = 0;
        self.spilled = false;
        self.spill.clear();
    }
}

/// Everything a finished stream produced.
#[derive(Debug)]
pub struct StreamOutcome {
    /// Concatenation of every emitted text delta, in order.
    pub transcript: String,
    /// Finalized tool calls, in accumulator index order.
    pub tool_calls: Vec<ToolCall>,
    /// Last usage snapshot the server sent, if any.
    pub usage: Usage,
}

/// Stateful decoder for one turn's SSE body.
pub struct StreamDecoder<'a, W: Write> {
    display: &'a mut W,
    transcript: String,
    accumulator: ToolCallAccumulator,
    usage: Usage,
    /// Unterminated tail of the current line, across feed() calls.
    line: LineBuffer,
    /// Joined `data:` payload of the event being assembled.
    event: String,
    done: bool,
}

impl<'a, W: Write> StreamDecoder<'a, W> {
    pub fn new(display: &'a mut W) -> Self {
        Self {
            display,
            transcript: String::new(),
            accumulator: ToolCallAccumulator::new(),
            usage: Usage::default(),
            line: LineBuffer::default(),
            event: String::new(),
            done: false,
        }
    }

    /// True once the `[DONE]` terminator has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume one body chunk, processing every completed line in it.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), ApiError> {
        for &byte in chunk {
            if self.done {
                break;
            }
            if byte == b'\n' {
                let line = std::mem::take(&mut self.line);
                self.process_line(line.as_slice())?;
                // Put the buffer back so a heap spill keeps its capacity.
                self.line = line;
                self.line.clear();
            } else {
                self.line.push(byte);
            }
        }
        Ok(())
    }

    /// Finish the stream (explicit `[DONE]` or EOF) and finalize.
    pub fn finish(mut self) -> Result<StreamOutcome, ApiError> {
        let tool_calls = self.accumulator.take()?;
        Ok(StreamOutcome {
            transcript: self.transcript,
            tool_calls,
            usage: self.usage,
        })
    }

    fn process_line(&mut self, raw: &[u8]) -> Result<(), ApiError> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        if raw.is_empty() {
            let payload = std::mem::take(&mut self.event);
            if payload.is_empty() {
                return Ok(());
            }
            if payload == "[DONE]" {
                self.done = true;
                return Ok(());
            }
            let value: Value = serde_json::from_str(&payload)
                .map_err(|e| ApiError::StreamFormat(format!("invalid event payload: {e}")))?;
            return self.dispatch(&value);
        }

        let line = String::from_utf8_lossy(raw);
        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            if !self.event.is_empty() {
                self.event.push('\n');
            }
            self.event.push_str(payload);
            if self.event.len() > MAX_EVENT_BYTES {
                return Err(ApiError::StreamFormat(format!(
                    "event exceeds {MAX_EVENT_BYTES} bytes"
                )));
            }
        }
        // Comment, `event:`, `id:` and other fields are ignored.
        Ok(())
    }

    /// Route one parsed event object to its effects.
    fn dispatch(&mut self, event: &Value) -> Result<(), ApiError> {
        if let Some(choices) = event.get("choices").and_then(Value::as_array) {
            for choice in choices {
                let Some(delta) = choice.get("delta") else {
                    continue;
                };
                if let Some(text) = delta.as_str() {
                    self.emit(text)?;
                    continue;
                }
                if !delta.is_object() {
                    continue;
                }
                if let Some(fragments) = delta.get("tool_calls").and_then(Value::as_array) {
                    for fragment in fragments {
                        self.accumulator.apply_fragment(fragment)?;
                    }
                }
                if let Some(content) = delta.get("content") {
                    self.walk_content(content)?;
                } else if let Some(text) = delta.get("output_text").and_then(Value::as_str) {
                    self.emit(text)?;
                }
            }
        }

        if let Some(usage) = event.get("usage").filter(|u| u.is_object()) {
            self.update_usage(usage);
        }
        Ok(())
    }

    /// Recursive handling of the `content` field's shapes: a plain string,
    /// an array of strings/objects, or an object with `text`/`content`.
    fn walk_content(&mut self, content: &Value) -> Result<(), ApiError> {
        match content {
            Value::String(text) => self.emit(text),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(text) => self.emit(text)?,
                        Value::Object(map) => {
                            if let Some(text) = map.get("text").and_then(Value::as_str) {
                                self.emit(text)?;
                            } else if let Some(nested) = map.get("content") {
                                self.walk_content(nested)?;
                            }
                        }
                        _ => {}
                    }
                }
                Ok(())
            }
            Value::Object(map) => {
                if let Some(text) = map.get("text").and_then(Value::as_str) {
                    self.emit(text)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Write one delta to the display (flushing eagerly at line ends) and
    /// append it to the transcript.
    fn emit(&mut self, text: &str) -> Result<(), ApiError> {
        if text.is_empty() {
            return Ok(());
        }
        self.display
            .write_all(text.as_bytes())
            .and_then(|()| {
                if text.contains('\n') {
                    self.display.flush()
                } else {
                    Ok(())
                }
            })
            .map_err(|e| ApiError::StreamFormat(format!("display write failed: {e}")))?;
        self.transcript.push_str(text);
        Ok(())
    }

    fn update_usage(&mut self, usage: &Value) {
        let prompt = coerce_token_count(usage.get("prompt_tokens"));
        let completion = coerce_token_count(usage.get("completion_tokens"));
        let total = coerce_token_count(usage.get("total_tokens"));
        if let (Some(prompt_tokens), Some(completion_tokens), Some(total_tokens)) =
            (prompt, completion, total)
        {
            self.usage = Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
                valid: true,
            };
        }
    }
}

/// Integer-coerce a token count: integer, float (truncated), or numeric
/// string.
fn coerce_token_count(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        if f >= 0.0 {
            return Some(f as u64);
        }
        return None;
    }
    value.as_str()?.trim().parse::<u64>().ok()
}
