//! Sandbox-rooted path resolution.
//!
//! Every file-system path a tool touches goes through the sandbox. Existing
//! paths are resolved through the real filesystem (following symlinks) and
//! the *canonical* result is checked for containment, so a symlink pointing
//! outside the root cannot smuggle an escape. Paths that may not exist yet
//! (patch targets) use a lexical containment predicate instead.

use crate::error::ToolError;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// Access mode for the sandbox root.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    /// Tools may read inside the root; nothing is written.
    #[default]
    ReadOnly,
    /// Tools may read and write inside the root.
    WorkspaceWrite,
    /// Containment checks are skipped entirely.
    DangerFullAccess,
}

/// Canonicalized sandbox root plus the session's write-permission state.
#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    mode: SandboxMode,
    workspace_write_enabled: bool,
    workspace_write_denied_this_session: bool,
}

impl Sandbox {
    /// Canonicalize `root` and build a sandbox over it.
    ///
    /// Upholds the invariant `workspace_write_enabled ⇔ mode != ReadOnly`.
    pub fn new(root: &Path, mode: SandboxMode) -> Result<Self, ToolError> {
        let root = root
            .canonicalize()
            .map_err(|e| ToolError::InvalidSandbox(format!("{}: {e}", root.display())))?;
        if !root.is_dir() {
            return Err(ToolError::InvalidSandbox(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            mode,
            workspace_write_enabled: mode != SandboxMode::ReadOnly,
            workspace_write_denied_this_session: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> SandboxMode {
        self.mode
    }

    pub fn workspace_write_enabled(&self) -> bool {
        self.workspace_write_enabled
    }

    pub fn workspace_write_denied_this_session(&self) -> bool {
        self.workspace_write_denied_this_session
    }

    /// Grant write access for the remainder of the process.
    pub fn enable_workspace_write(&mut self) {
        self.workspace_write_enabled = true;
        self.mode = SandboxMode::WorkspaceWrite;
    }

    /// Record a user denial; later escalations short-circuit to failure.
    pub fn deny_workspace_write_for_session(&mut self) {
        self.workspace_write_denied_this_session = true;
    }

    /// Resolve a user-supplied path to a canonical absolute path inside the
    /// root.
    ///
    /// Relative paths are joined to the root first. The canonical result must
    /// be the root itself or start with `root + separator`; anything else is
    /// `PathOutsideSandbox`.
    pub fn resolve(&self, user_path: &str) -> Result<PathBuf, ToolError> {
        if user_path.trim().is_empty() {
            return Err(ToolError::InvalidPayload("empty path".to_string()));
        }

        let joined = self.join(user_path);
        let canonical = joined.canonicalize().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::PathNotFound(user_path.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                ToolError::PermissionDenied(user_path.to_string())
            }
            _ => ToolError::IoFailure(format!("{user_path}: {e}")),
        })?;

        if self.mode == SandboxMode::DangerFullAccess || self.contains(&canonical) {
            Ok(canonical)
        } else {
            Err(ToolError::PathOutsideSandbox(user_path.to_string()))
        }
    }

    /// Containment predicate for paths that may not exist yet.
    ///
    /// `candidate` is normalized lexically (`.` removed, `..` popped) and
    /// must then equal the root or continue it past a separator. Used by the
    /// patch applier for files it is about to create.
    pub fn within(&self, candidate: &Path) -> bool {
        if self.mode == SandboxMode::DangerFullAccess {
            return true;
        }
        let absolute = if candidate.is_absolute() {
            lexical_normalize(candidate)
        } else {
            lexical_normalize(&self.root.join(candidate))
        };
        self.contains(&absolute)
    }

    /// Join a user path to the root without touching the filesystem.
    pub fn join(&self, user_path: &str) -> PathBuf {
        let path = Path::new(user_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Byte-prefix containment: equality, or a separator at `root.len()`.
    fn contains(&self, candidate: &Path) -> bool {
        let root = self.root.as_os_str().as_encoded_bytes();
        let candidate = candidate.as_os_str().as_encoded_bytes();
        if candidate == root {
            return true;
        }
        candidate.len() > root.len()
            && candidate.starts_with(root)
            && candidate[root.len()] == std::path::MAIN_SEPARATOR as u8
    }

    /// Render a resolved path relative to the root for tool output.
    pub fn display_relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Remove `.` components and pop `..` components without touching the
/// filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
