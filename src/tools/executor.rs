//! Tool dispatch and the failure boundary.
//!
//! The executor owns the sandbox. Every tool failure that does not
//! destabilize the process is converted into a success-shaped tool result —
//! a JSON document with `{status:"failure", tool_id, error}` — so the
//! conversation invariant holds: every tool_call id is answered by exactly
//! one tool message, and the model can read the error and self-correct.
//!
//! `WorkspaceWriteRequired` is the single exception: it propagates as an
//! error because the session must run the approval handshake before the
//! call can be retried.

use crate::error::ToolError;
use crate::sandbox::Sandbox;
use crate::tools::{self, ToolKind};
use crate::types::ToolCall;
use serde_json::{json, Value};

/// Outcome of one dispatched tool call.
#[derive(Debug)]
pub enum ToolResult {
    /// The tool's success payload.
    Success(Value),
    /// A captured failure, already reduced to a short message.
    Failure(String),
}

impl ToolResult {
    /// Serialize into the content of the paired tool message.
    pub fn into_message_content(self, tool_id: &str) -> String {
        match self {
            Self::Success(payload) => payload.to_string(),
            Self::Failure(error) => {
                json!({"status": "failure", "tool_id": tool_id, "error": error}).to_string()
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Dispatches tool invocations against the sandbox it owns.
pub struct ToolExecutor {
    sandbox: Sandbox,
}

impl ToolExecutor {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Grant workspace write for the remainder of the process.
    pub fn enable_workspace_write(&mut self) {
        self.sandbox.enable_workspace_write();
    }

    /// Record a user denial for the rest of the session.
    pub fn deny_workspace_write(&mut self) {
        self.sandbox.deny_workspace_write_for_session();
    }

    /// Execute one call.
    ///
    /// `Err` carries only `WorkspaceWriteRequired`; every other failure is
    /// folded into `ToolResult::Failure`.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let Some(schema) = tools::find(&call.function.name) else {
            return Ok(ToolResult::Failure(
                ToolError::ToolNotFound(call.function.name.clone()).to_string(),
            ));
        };

        if schema.permission == tools::Permission::WorkspaceWrite
            && !self.sandbox.workspace_write_enabled()
        {
            return Err(ToolError::WorkspaceWriteRequired { tool_id: schema.id });
        }

        let outcome = match schema.kind {
            ToolKind::ListDirectory => {
                tools::list_dir::run(&self.sandbox, &call.function.arguments).await
            }
            ToolKind::ReadFile => {
                tools::read_file::run(&self.sandbox, &call.function.arguments).await
            }
            ToolKind::Search => tools::search::run(&self.sandbox, &call.function.arguments).await,
            ToolKind::ApplyPatch => {
                tools::patch::run(&self.sandbox, &call.function.arguments).await
            }
        };

        match outcome {
            Ok(payload) => Ok(ToolResult::Success(payload)),
            Err(error) => Ok(ToolResult::Failure(error.to_string())),
        }
    }
}
