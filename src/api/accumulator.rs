//! Tool-call reconstruction from streamed fragments.
//!
//! Chat-completion servers deliver tool calls as index-keyed fragments: the
//! first fragment for an index usually carries `id` and `function.name`,
//! later ones append to `function.arguments`. The accumulator merges them
//! under a monotonic rule — once a field is set it must never change — and
//! finalizes into [`ToolCall`]s when the stream ends.

use crate::error::ApiError;
use crate::types::ToolCall;
use serde_json::Value;

/// One in-flight tool call, indexed by the stream-provided integer.
#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Ordered accumulation state for one turn's tool calls.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    partials: Vec<PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }

    /// Merge one fragment object from a `choices[].delta.tool_calls` array.
    pub fn apply_fragment(&mut self, fragment: &Value) -> Result<(), ApiError> {
        let index = match fragment.get("index").and_then(Value::as_u64) {
            Some(index) => index as usize,
            // Servers either always index or never: a missing index is only
            // meaningful as 0 before any indexed fragment arrived.
            None if self.partials.is_empty() => 0,
            None => {
                return Err(ApiError::StreamFormat(
                    "tool-call fragment without index after indexed fragments".to_string(),
                ))
            }
        };

        let partial = self.acquire(index);

        if let Some(id) = fragment.get("id").and_then(Value::as_str) {
            set_monotonic(&mut partial.id, id, "id")?;
        }
        if let Some(function) = fragment.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                if name.is_empty() {
                    return Err(ApiError::StreamFormat(
                        "tool-call fragment with empty function name".to_string(),
                    ));
                }
                set_monotonic(&mut partial.name, name, "name")?;
            }
            if let Some(chunk) = function.get("arguments").and_then(Value::as_str) {
                partial.arguments.push_str(chunk);
            }
        }
        Ok(())
    }

    /// Grow the list with defaults until `index` is in range.
    fn acquire(&mut self, index: usize) -> &mut PartialToolCall {
        while self.partials.len() <= index {
            self.partials.push(PartialToolCall::default());
        }
        &mut self.partials[index]
    }

    /// Finalize all partials into complete calls and reset the accumulator.
    ///
    /// The reset happens whether or not finalization succeeds, so a failed
    /// turn cannot leak fragments into the next one.
    pub fn take(&mut self) -> Result<Vec<ToolCall>, ApiError> {
        let partials = std::mem::take(&mut self.partials);
        let mut calls = Vec::with_capacity(partials.len());
        for (index, partial) in partials.into_iter().enumerate() {
            let id = partial
                .id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| missing_field(index, "id"))?;
            let name = partial
                .name
                .filter(|name| !name.is_empty())
                .ok_or_else(|| missing_field(index, "name"))?;
            calls.push(ToolCall::function(id, name, partial.arguments));
        }
        Ok(calls)
    }
}

/// Store on first set; silently accept an equal repeat; reject a change.
fn set_monotonic(slot: &mut Option<String>, value: &str, field: &str) -> Result<(), ApiError> {
    match slot {
        None => {
            *slot = Some(value.to_string());
            Ok(())
        }
        Some(existing) if existing == value => Ok(()),
        Some(existing) => Err(ApiError::StreamFormat(format!(
            "tool-call {field} changed mid-stream: {existing:?} -> {value:?}"
        ))),
    }
}

fn missing_field(index: usize, field: &str) -> ApiError {
    ApiError::StreamFormat(format!("tool call at index {index} finalized without {field}"))
}
