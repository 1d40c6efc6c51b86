//! Data model for the OpenAI-compatible chat wire protocol and the
//! conversation it accumulates.
//!
//! These types serialize directly to the JSON payloads expected by any
//! OpenAI-compatible streaming endpoint. The conversation owns message
//! history for the lifetime of the process; a [`Transaction`] scopes one
//! turn so a failed turn rolls every append back.

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

// ---------------------------------------------------------------------------
// Message roles
// ---------------------------------------------------------------------------

/// Conversation participant role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction message.
    System,
    /// End-user message.
    User,
    /// Assistant/model message.
    Assistant,
    /// Tool execution result message.
    Tool,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A single message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author role for this conversation turn.
    pub role: Role,

    /// Text content. None serializes as an explicit JSON null, which is the
    /// wire shape for an assistant message that spoke only through tool calls.
    pub content: Option<String>,

    /// Tool calls requested by the assistant. Empty for other roles.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// When role == Tool, the id of the tool_call this result answers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool name echoed on tool-result messages.
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// How many of `tool_calls` have been dispatched. Local bookkeeping only.
    #[serde(skip)]
    pub processed_tool_calls: usize,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            processed_tool_calls: 0,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            processed_tool_calls: 0,
        }
    }

    /// Create an assistant message from a streamed transcript and any
    /// finalized tool calls. An empty transcript with tool calls present
    /// becomes explicit null content.
    pub fn assistant(transcript: String, tool_calls: Vec<ToolCall>) -> Self {
        let content = if transcript.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(transcript)
        };
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            tool_name: None,
            processed_tool_calls: 0,
        }
    }

    /// Create a tool result message, sent back after executing a tool call.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            processed_tool_calls: 0,
        }
    }

    /// True when this assistant message still has undispatched tool calls.
    pub fn has_pending_tool_calls(&self) -> bool {
        self.role == Role::Assistant && self.processed_tool_calls < self.tool_calls.len()
    }
}

// ---------------------------------------------------------------------------
// Tool calls (in assistant responses)
// ---------------------------------------------------------------------------

/// A tool invocation requested by the model.
///
/// The `(id, name)` pair is immutable once the call is finalized from its
/// stream fragments; `arguments` is the raw JSON-object text the model wrote.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    /// Unique id used to correlate tool call and tool result.
    pub id: String,
    /// Tool call type; currently always `"function"`.
    #[serde(rename = "type")]
    pub call_type: String,
    /// Function metadata and arguments for this tool invocation.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Build a function-typed call from finalized accumulator state.
    pub fn function(id: String, name: String, arguments: String) -> Self {
        Self {
            id,
            call_type: "function".to_string(),
            function: FunctionCall { name, arguments },
        }
    }
}

/// The function name and JSON-encoded arguments within a tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    /// Function/tool name to execute.
    pub name: String,
    /// JSON-encoded string of the arguments object.
    pub arguments: String,
}

// ---------------------------------------------------------------------------
// Tool definitions (sent in requests)
// ---------------------------------------------------------------------------

/// Tool definition included in the API request so the model knows what's
/// available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool definition type; currently always `"function"`.
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function schema published to the model.
    pub function: FunctionDefinition,
}

/// The schema of a callable function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Exposed function/tool name.
    pub name: String,
    /// Natural-language description of tool behavior.
    pub description: String,
    /// JSON Schema object describing the parameters.
    pub parameters: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

/// Token usage reported by the API for one turn.
///
/// `valid` flips to true only when the server sent a complete usage object
/// this turn; partial or absent usage leaves the counters untrusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub valid: bool,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Append-only message history for the process lifetime.
///
/// Invariant: after every completed turn the last message is either an
/// assistant message with no pending tool calls, or a tool message implying
/// a follow-up turn.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Drop every message appended after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Pop the next undispatched tool call, scanning from the end.
    ///
    /// The first assistant message (nearest the end) with
    /// `processed_tool_calls < tool_calls.len()` yields its next call and
    /// advances the counter. Returns None when no calls are pending.
    pub fn take_pending_tool_call(&mut self) -> Option<ToolCall> {
        let message = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.has_pending_tool_calls())?;
        let call = message.tool_calls[message.processed_tool_calls].clone();
        message.processed_tool_calls += 1;
        Some(call)
    }

    /// True when some assistant message still has undispatched tool calls.
    pub fn has_pending_tool_calls(&self) -> bool {
        self.messages.iter().any(Message::has_pending_tool_calls)
    }

    /// Open a rollback scope for one turn.
    pub fn transaction(&mut self) -> Transaction<'_> {
        let baseline = self.messages.len();
        Transaction {
            conversation: self,
            baseline,
            committed: false,
        }
    }
}

/// Scoped conversation transaction: rolls appended messages back on drop
/// unless committed.
pub struct Transaction<'a> {
    conversation: &'a mut Conversation,
    baseline: usize,
    committed: bool,
}

impl Transaction<'_> {
    /// Keep everything appended during this scope.
    pub fn commit(mut self) {
        self.committed = true;
    }

    /// Message count at scope entry.
    pub fn baseline(&self) -> usize {
        self.baseline
    }
}

impl Deref for Transaction<'_> {
    type Target = Conversation;

    fn deref(&self) -> &Conversation {
        self.conversation
    }
}

impl DerefMut for Transaction<'_> {
    fn deref_mut(&mut self) -> &mut Conversation {
        self.conversation
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.conversation.truncate(self.baseline);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
