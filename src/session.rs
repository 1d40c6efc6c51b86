//! Session runner: drives one user prompt to completion.
//!
//! A prompt starts a model turn; while the streamed assistant message
//! carries tool calls, the runner dispatches them strictly in order, appends
//! the paired tool messages, and asks the model again. A tool that needs
//! workspace write while the sandbox is read-only pauses dispatch for a
//! yes/no approval handshake; grants last for the process, denials for the
//! session.

use crate::api::ChatClient;
use crate::config::ApprovalPolicy;
use crate::error::{AgentError, ToolError};
use crate::render::{Renderer, TurnWriter};
use crate::sandbox::{Sandbox, SandboxMode};
use crate::tokens::ContextUsage;
use crate::tools;
use crate::tools::executor::{ToolExecutor, ToolResult};
use crate::types::{Conversation, Message, ToolCall};
use std::io::{BufRead, Write};

/// Base instructions sent as the first system message of every request.
pub const SYSTEM_PROMPT: &str = "You are twiddle, a coding agent running in a user's terminal. \
You explore and modify the user's workspace exclusively through the provided tools: \
list_directory, read_file, search, and apply_patch. Paths are relative to the workspace \
root. Keep answers short and grounded in what the tools returned.";

/// Second system message describing the sandbox to the model.
pub fn tool_context(sandbox: &Sandbox) -> String {
    let mode = match sandbox.mode() {
        SandboxMode::ReadOnly => "read-only",
        SandboxMode::WorkspaceWrite => "workspace-write",
        SandboxMode::DangerFullAccess => "danger-full-access",
    };
    format!(
        "Workspace sandbox root: {} (mode: {mode}). Every file path you pass to a tool is \
resolved inside this root.",
        sandbox.root().display()
    )
}

/// Per-process session state: one conversation, one sandbox, one client.
pub struct SessionRunner {
    client: ChatClient,
    executor: ToolExecutor,
    approval_policy: ApprovalPolicy,
    renderer: Renderer,
    conversation: Conversation,
    context_window: u64,
    /// Dump raw tool payloads after the summary line (TWIDDLE_DEBUG).
    debug_payloads: bool,
}

impl SessionRunner {
    pub fn new(
        client: ChatClient,
        executor: ToolExecutor,
        approval_policy: ApprovalPolicy,
        renderer: Renderer,
        debug_payloads: bool,
    ) -> Self {
        let context_window = crate::tokens::context_window_for(client.model());
        Self {
            client,
            executor,
            approval_policy,
            renderer,
            conversation: Conversation::new(),
            context_window,
            debug_payloads,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Drive one user prompt through model turns and tool dispatch until the
    /// model stops emitting tool calls.
    pub async fn run_prompt<R: BufRead, W: Write>(
        &mut self,
        prompt: &str,
        input: &mut R,
        display: &mut W,
    ) -> Result<(), AgentError> {
        let mut user_text = Some(prompt);

        loop {
            let outcome = {
                let spinner = self.renderer.spinner("waiting for model");
                let mut writer = TurnWriter::new(&mut *display, Some(spinner));
                let definitions = tools::definitions();
                self.client
                    .respond(&mut self.conversation, user_text.take(), &definitions, &mut writer)
                    .await?
            };

            if let Some(context) = ContextUsage::from_usage(self.context_window, &outcome.usage) {
                self.renderer.context_usage(&context);
            }

            if !outcome.tool_calls_pending {
                let _ = writeln!(display);
                return Ok(());
            }

            while let Some(call) = self.conversation.take_pending_tool_call() {
                self.dispatch_call(&call, input, display).await?;
            }
        }
    }

    /// Execute one tool call and append its paired tool message.
    async fn dispatch_call<R: BufRead, W: Write>(
        &mut self,
        call: &ToolCall,
        input: &mut R,
        display: &mut W,
    ) -> Result<(), AgentError> {
        if call.id.is_empty() || call.function.name.is_empty() || call.function.arguments.is_empty()
        {
            return Err(AgentError::ToolEnvelopeInvalid(format!(
                "id={:?} name={:?} arguments_len={}",
                call.id,
                call.function.name,
                call.function.arguments.len()
            )));
        }

        let tool_id = call.function.name.as_str();
        let result = match self.executor.execute(call).await {
            Ok(result) => result,
            Err(ToolError::WorkspaceWriteRequired { tool_id }) => {
                if self.escalate(tool_id, input, display)? {
                    // Retry the same call now that writes are enabled.
                    match self.executor.execute(call).await {
                        Ok(result) => result,
                        Err(err) => ToolResult::Failure(err.to_string()),
                    }
                } else {
                    ToolResult::Failure(format!("workspace write denied for tool {tool_id}"))
                }
            }
            Err(err) => ToolResult::Failure(err.to_string()),
        };

        self.summarize_result(tool_id, &result, display);

        let content = result.into_message_content(tool_id);
        if self.debug_payloads {
            self.renderer.debug_payload(&content);
        }
        self.conversation
            .push(Message::tool_result(&call.id, tool_id, content));
        Ok(())
    }

    /// Approval handshake for a write-requiring tool in a read-only sandbox.
    ///
    /// Returns whether the write was granted. Policy `never` and an earlier
    /// denial both short-circuit without prompting.
    fn escalate<R: BufRead, W: Write>(
        &mut self,
        tool_id: &str,
        input: &mut R,
        display: &mut W,
    ) -> Result<bool, AgentError> {
        if self.approval_policy == ApprovalPolicy::Never
            || self.executor.sandbox().workspace_write_denied_this_session()
        {
            return Ok(false);
        }

        let _ = write!(
            display,
            "tool {tool_id} wants to write inside the workspace. Allow? [y/N] "
        );
        let _ = display.flush();

        let mut answer = String::new();
        input
            .read_line(&mut answer)
            .map_err(|e| AgentError::Tool(ToolError::IoFailure(format!("approval input: {e}"))))?;

        if matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            self.executor.enable_workspace_write();
            Ok(true)
        } else {
            self.executor.deny_workspace_write();
            Ok(false)
        }
    }

    /// One-line dispatch outcome on the output stream.
    fn summarize_result<W: Write>(&self, tool_id: &str, result: &ToolResult, display: &mut W) {
        let line = match result {
            ToolResult::Success(payload) => {
                let detail = tools::find(tool_id).and_then(|schema| (schema.summarize)(payload));
                match detail {
                    Some(detail) => format!("tool:{tool_id} success ({detail})"),
                    None => format!("tool:{tool_id} success"),
                }
            }
            ToolResult::Failure(message) => format!("tool:{tool_id} failure: {message}"),
        };
        let _ = writeln!(display, "{line}");
        let _ = display.flush();
    }
}
