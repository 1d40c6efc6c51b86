//! twiddle — an interactive terminal coding agent for OpenAI-compatible
//! APIs.
//!
//! One CLI process hosts one conversation. Each turn streams the model's
//! SSE response to the terminal, reconstructs any tool calls from the
//! fragment stream, executes them under a sandbox rooted at the working
//! directory, and feeds the results back until the model stops calling
//! tools.
//!
//! # Quick start
//!
//! ```no_run
//! use twiddle::api::ChatClient;
//! use twiddle::config::load_config;
//! use twiddle::render::Renderer;
//! use twiddle::sandbox::{Sandbox, SandboxMode};
//! use twiddle::session::{tool_context, SessionRunner, SYSTEM_PROMPT};
//! use twiddle::tools::executor::ToolExecutor;
//!
//! # async fn example() {
//! let config = load_config().unwrap();
//! let sandbox = Sandbox::new(std::path::Path::new("."), SandboxMode::ReadOnly).unwrap();
//! let client = ChatClient::new(&config, SYSTEM_PROMPT.to_string(), tool_context(&sandbox));
//! let mut runner = SessionRunner::new(
//!     client,
//!     ToolExecutor::new(sandbox),
//!     config.approval_policy,
//!     Renderer::new(false),
//!     false,
//! );
//! let mut stdin = std::io::BufReader::new(std::io::stdin());
//! let mut stdout = std::io::stdout();
//! runner.run_prompt("list the workspace", &mut stdin, &mut stdout).await.unwrap();
//! # }
//! ```

/// Streaming chat client, SSE decoder, and tool-call accumulator.
pub mod api;
/// CLI argument parsing.
pub mod cli;
/// Config loading and defaults.
pub mod config;
/// Error types used across crate modules.
pub mod error;
/// Terminal rendering and the turn spinner.
pub mod render;
/// Sandbox-rooted path resolution.
pub mod sandbox;
/// Turn loop and approval handshake.
pub mod session;
#[cfg(test)]
/// Shared testing utilities compiled only for tests.
pub mod testsupport;
/// Shared text truncation helpers.
pub mod textutil;
/// Context-window accounting.
pub mod tokens;
/// Built-in tool implementations and the schema registry.
pub mod tools;
/// Wire-protocol data model and the conversation.
pub mod types;
