//! Unified error types for the agent.

use std::fmt;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
///
/// These surface before any turn starts and abort the process.
#[derive(Debug)]
pub enum ConfigError {
    /// No API key in the config file and no `OPENAI_API_KEY` in the environment.
    ApiKeyMissing,
    /// Config file exceeds the 64 KiB read cap.
    TooLarge(u64),
    Io(std::io::Error),
    Toml(toml::de::Error),
    /// Empty string or unknown enum value for a recognized key.
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKeyMissing => {
                write!(f, "no API key: set `api_key` in twiddle.toml or OPENAI_API_KEY")
            }
            Self::TooLarge(size) => write!(f, "config file too large ({size} bytes, cap 64 KiB)"),
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the HTTP API layer and the streaming decoder.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the API.
    Status { code: u16, body: String },
    /// Malformed SSE framing, oversize event, or inconsistent tool-call fragment.
    StreamFormat(String),
    /// Serialized request payload exceeded the outbound bound.
    PayloadTooLarge(usize),
}

impl ApiError {
    /// True when the error belongs to the retryable transport subset.
    ///
    /// One retry per turn: connect/timeout-class transport failures plus the
    /// transient HTTP statuses. Everything else is terminal for the turn.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(inner) => inner.is_timeout() || inner.is_connect() || inner.is_request(),
            Self::Status { code, .. } => matches!(code, 408 | 429 | 502 | 503 | 504),
            Self::StreamFormat(_) | Self::PayloadTooLarge(_) => false,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status { code, body } => {
                if body.is_empty() {
                    write!(f, "status {code}")
                } else {
                    write!(f, "status {code}: {body}")
                }
            }
            Self::StreamFormat(msg) => write!(f, "stream format: {msg}"),
            Self::PayloadTooLarge(size) => write!(f, "request payload too large ({size} bytes)"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

// ---------------------------------------------------------------------------
// ToolError
// ---------------------------------------------------------------------------

/// Typed failures from tool cores, the sandbox, and the executor.
///
/// Every variant maps to a short human-readable message that the executor
/// folds into a failure payload for the model. `WorkspaceWriteRequired` is
/// the one variant the executor must not swallow: it pauses dispatch for the
/// approval handshake.
#[derive(Debug)]
pub enum ToolError {
    /// Sandbox root missing or not a directory at startup.
    InvalidSandbox(String),
    /// Canonical path is neither the root nor below it.
    PathOutsideSandbox(String),
    PathNotFound(String),
    PathNotDirectory(String),
    PathNotFile(String),
    PermissionDenied(String),
    IoFailure(String),
    /// The model supplied arguments the tool couldn't parse or validate.
    InvalidPayload(String),
    /// Slice-mode offset lies beyond the last line of the file.
    OffsetExceedsLength { offset: usize, total: usize },
    /// Indentation-mode anchor lies beyond the last line of the file.
    AnchorExceedsLength { anchor: usize, total: usize },
    /// Directory listing requested with `max_entries = 0`.
    NoEntriesRequested,
    /// Search engine binary not found in PATH.
    BinaryUnavailable(String),
    /// Child process exited with a hard failure code.
    CommandFailed(String),
    /// Child output or other tool byte cap exceeded.
    ToolLimitExceeded(String),
    /// Patch envelope or operation block is malformed.
    InvalidPatch(String),
    /// Patch operation conflicts with on-disk state.
    PatchConflict(String),
    /// Patch operation names an absolute path outside the sandbox.
    AbsolutePathForbidden(String),
    /// Tool needs workspace-write and the sandbox is read-only.
    WorkspaceWriteRequired { tool_id: &'static str },
    ToolNotFound(String),
    ToolUnavailable(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSandbox(msg) => write!(f, "invalid sandbox root: {msg}"),
            Self::PathOutsideSandbox(path) => {
                write!(f, "path escapes sandbox root: {path}")
            }
            Self::PathNotFound(path) => write!(f, "path not found: {path}"),
            Self::PathNotDirectory(path) => write!(f, "path is not a directory: {path}"),
            Self::PathNotFile(path) => write!(f, "path is not a regular file: {path}"),
            Self::PermissionDenied(path) => write!(f, "permission denied: {path}"),
            Self::IoFailure(msg) => write!(f, "io failure: {msg}"),
            Self::InvalidPayload(msg) => write!(f, "invalid arguments: {msg}"),
            Self::OffsetExceedsLength { offset, total } => {
                write!(f, "offset {offset} exceeds file length ({total} lines)")
            }
            Self::AnchorExceedsLength { anchor, total } => {
                write!(f, "anchor line {anchor} exceeds file length ({total} lines)")
            }
            Self::NoEntriesRequested => write!(f, "max_entries must be at least 1"),
            Self::BinaryUnavailable(name) => write!(f, "search binary unavailable: {name}"),
            Self::CommandFailed(msg) => write!(f, "command failed: {msg}"),
            Self::ToolLimitExceeded(msg) => write!(f, "output limit exceeded: {msg}"),
            Self::InvalidPatch(msg) => write!(f, "invalid patch: {msg}"),
            Self::PatchConflict(msg) => write!(f, "patch conflict: {msg}"),
            Self::AbsolutePathForbidden(path) => {
                write!(f, "absolute path forbidden: {path}")
            }
            Self::WorkspaceWriteRequired { tool_id } => {
                write!(f, "tool {tool_id} requires workspace write access")
            }
            Self::ToolNotFound(id) => write!(f, "unknown tool: {id}"),
            Self::ToolUnavailable(id) => write!(f, "tool unavailable: {id}"),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::PathNotFound(e.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(e.to_string()),
            _ => Self::IoFailure(e.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// AgentError — top-level
// ---------------------------------------------------------------------------

/// Top-level error type for the agent.
#[derive(Debug)]
pub enum AgentError {
    Config(ConfigError),
    Api(ApiError),
    Tool(ToolError),
    /// The assistant emitted a tool call that cannot be dispatched
    /// (empty id, empty name, or empty arguments).
    ToolEnvelopeInvalid(String),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Api(e) => write!(f, "api: {e}"),
            Self::Tool(e) => write!(f, "tool: {e}"),
            Self::ToolEnvelopeInvalid(msg) => write!(f, "undispatchable tool call: {msg}"),
        }
    }
}

impl std::error::Error for AgentError {}

impl From<ConfigError> for AgentError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ApiError> for AgentError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}

impl From<ToolError> for AgentError {
    fn from(e: ToolError) -> Self {
        Self::Tool(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display_messages_are_short_and_specific() {
        assert_eq!(
            ToolError::PathOutsideSandbox("/etc/passwd".into()).to_string(),
            "path escapes sandbox root: /etc/passwd"
        );
        assert_eq!(
            ToolError::OffsetExceedsLength { offset: 9, total: 3 }.to_string(),
            "offset 9 exceeds file length (3 lines)"
        );
        assert_eq!(
            ToolError::WorkspaceWriteRequired { tool_id: "apply_patch" }.to_string(),
            "tool apply_patch requires workspace write access"
        );
    }

    #[test]
    fn io_error_kinds_map_to_tool_error_kinds() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(ToolError::from(missing), ToolError::PathNotFound(_)));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked");
        assert!(matches!(ToolError::from(denied), ToolError::PermissionDenied(_)));

        let other = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(ToolError::from(other), ToolError::IoFailure(_)));
    }

    #[test]
    fn retryable_statuses_match_transient_set() {
        for code in [408u16, 429, 502, 503, 504] {
            let err = ApiError::Status { code, body: String::new() };
            assert!(err.is_retryable(), "status {code} should be retryable");
        }
        for code in [400u16, 401, 404, 500] {
            let err = ApiError::Status { code, body: String::new() };
            assert!(!err.is_retryable(), "status {code} should not be retryable");
        }
    }

    #[test]
    fn stream_format_is_never_retryable() {
        assert!(!ApiError::StreamFormat("bad frame".into()).is_retryable());
    }

    #[test]
    fn config_error_from_toml() {
        let toml_err: toml::de::Error = toml::from_str::<toml::Value>("x = [unclosed").unwrap_err();
        let e = ConfigError::from(toml_err);
        assert!(e.to_string().starts_with("toml:"));
    }

    #[test]
    fn agent_error_wraps_tool_error() {
        let ae = AgentError::from(ToolError::NoEntriesRequested);
        assert!(ae.to_string().starts_with("tool:"), "got: {ae}");
    }
}
