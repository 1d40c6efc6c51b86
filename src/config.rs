//! Configuration loading.
//!
//! One TOML file at `~/.twiddle/twiddle.toml` (`%USERPROFILE%` on Windows)
//! holds connection and policy settings. A missing file means defaults; a
//! malformed file is a startup error. The loader takes injectable read/env
//! sources so tests never touch the real home directory.

use crate::error::ConfigError;
use crate::sandbox::SandboxMode;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Read cap for the config file.
const MAX_CONFIG_BYTES: u64 = 64 * 1024;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api";
pub const DEFAULT_MODEL: &str = "openai/gpt-5-codex";

/// When the session asks before enabling workspace writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApprovalPolicy {
    /// Prompt the user on the first write-requiring tool call.
    #[default]
    OnRequest,
    /// Never prompt; write-requiring tools fail while the sandbox is
    /// read-only.
    Never,
}

/// API credential that zeroes its bytes when dropped.
pub struct SecretString(Vec<u8>);

impl SecretString {
    pub fn new(value: String) -> Self {
        Self(value.into_bytes())
    }

    pub fn expose(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        for byte in self.0.iter_mut() {
            *byte = 0;
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

/// Resolved runtime configuration.
#[derive(Debug)]
pub struct Config {
    pub base_url: String,
    pub model: String,
    pub api_key: SecretString,
    pub sandbox_mode: SandboxMode,
    pub approval_policy: ApprovalPolicy,
    /// Optional sampling temperature forwarded to the request payload.
    pub temperature: Option<f64>,
    /// Optional completion-token cap forwarded to the request payload.
    pub max_completion_tokens: Option<u64>,
}

/// Raw on-disk representation before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    sandbox_mode: Option<String>,
    approval_policy: Option<String>,
    temperature: Option<f64>,
    max_completion_tokens: Option<u64>,
}

/// Load configuration from disk and environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from_sources(
        default_config_path().as_deref(),
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
    )
}

/// `~/.twiddle/twiddle.toml`, if a home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    let home = if cfg!(windows) {
        std::env::var_os("USERPROFILE")
    } else {
        std::env::var_os("HOME")
    }?;
    Some(PathBuf::from(home).join(".twiddle").join("twiddle.toml"))
}

/// Load configuration from injectable sources.
pub fn load_config_from_sources<FRead, FEnv>(
    config_path: Option<&Path>,
    read_file: FRead,
    env_lookup: FEnv,
) -> Result<Config, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
{
    let parsed = match config_path {
        Some(path) => match read_file(path) {
            Ok(text) => {
                if text.len() as u64 > MAX_CONFIG_BYTES {
                    return Err(ConfigError::TooLarge(text.len() as u64));
                }
                let parsed: FileConfig = toml::from_str(&text)?;
                zero_bytes(text);
                parsed
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileConfig::default(),
            Err(e) => return Err(ConfigError::Io(e)),
        },
        None => FileConfig::default(),
    };

    resolve(parsed, env_lookup)
}

fn resolve<FEnv>(file: FileConfig, env_lookup: FEnv) -> Result<Config, ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    let base_url = required_or_default(file.base_url, "base_url", DEFAULT_BASE_URL)?;
    let model = required_or_default(file.model, "model", DEFAULT_MODEL)?;

    let sandbox_mode = match file.sandbox_mode.as_deref() {
        None => SandboxMode::ReadOnly,
        Some("read-only") => SandboxMode::ReadOnly,
        Some("workspace-write") => SandboxMode::WorkspaceWrite,
        Some("danger-full-access") => SandboxMode::DangerFullAccess,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "unknown sandbox_mode `{other}` (expected read-only, workspace-write, or danger-full-access)"
            )))
        }
    };

    let approval_policy = match file.approval_policy.as_deref() {
        None => ApprovalPolicy::OnRequest,
        Some("on-request") => ApprovalPolicy::OnRequest,
        Some("never") => ApprovalPolicy::Never,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "unknown approval_policy `{other}` (expected on-request or never)"
            )))
        }
    };

    let api_key = match file.api_key {
        Some(key) if key.is_empty() => {
            return Err(ConfigError::Invalid("api_key must not be empty".to_string()))
        }
        Some(key) => key,
        None => env_lookup("OPENAI_API_KEY").unwrap_or_default(),
    };
    if api_key.trim().is_empty() {
        return Err(ConfigError::ApiKeyMissing);
    }

    Ok(Config {
        base_url: base_url.trim_end_matches('/').to_string(),
        model,
        api_key: SecretString::new(api_key),
        sandbox_mode,
        approval_policy,
        temperature: file.temperature,
        max_completion_tokens: file.max_completion_tokens,
    })
}

fn required_or_default(
    value: Option<String>,
    key: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => {
            Err(ConfigError::Invalid(format!("{key} must not be empty")))
        }
        Some(v) => Ok(v),
        None => Ok(default.to_string()),
    }
}

/// Overwrite a sensitive text buffer before it is freed.
fn zero_bytes(text: String) {
    let mut bytes = text.into_bytes();
    for byte in bytes.iter_mut() {
        *byte = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_file(_: &Path) -> Result<String, std::io::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"))
    }

    #[test]
    fn missing_file_yields_defaults_with_env_key() {
        let config = load_config_from_sources(Some(Path::new("/nowhere")), no_file, |name| {
            (name == "OPENAI_API_KEY").then(|| "sk-env".to_string())
        })
        .unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_key.expose(), "sk-env");
        assert_eq!(config.sandbox_mode, SandboxMode::ReadOnly);
        assert_eq!(config.approval_policy, ApprovalPolicy::OnRequest);
    }

    #[test]
    fn file_values_override_defaults() {
        let toml_text = r#"
            base_url = "https://api.example.com/v2/"
            model = "acme/coder-1"
            api_key = "sk-file"
            sandbox_mode = "workspace-write"
            approval_policy = "never"
            temperature = 0.2
            max_completion_tokens = 4096
        "#;
        let config = load_config_from_sources(
            Some(Path::new("twiddle.toml")),
            |_| Ok(toml_text.to_string()),
            |_| None,
        )
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com/v2");
        assert_eq!(config.model, "acme/coder-1");
        assert_eq!(config.api_key.expose(), "sk-file");
        assert_eq!(config.sandbox_mode, SandboxMode::WorkspaceWrite);
        assert_eq!(config.approval_policy, ApprovalPolicy::Never);
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_completion_tokens, Some(4096));
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let err = load_config_from_sources(
            Some(Path::new("twiddle.toml")),
            |_| Ok("api_key = \"k\"\nsandbox_mode = \"yolo\"".to_string()),
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");

        let err = load_config_from_sources(
            Some(Path::new("twiddle.toml")),
            |_| Ok("api_key = \"k\"\napproval_policy = \"always\"".to_string()),
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "got: {err}");
    }

    #[test]
    fn empty_strings_are_rejected() {
        for body in [
            "api_key = \"k\"\nbase_url = \"\"",
            "api_key = \"k\"\nmodel = \" \"",
            "api_key = \"\"",
        ] {
            let err = load_config_from_sources(
                Some(Path::new("twiddle.toml")),
                |_| Ok(body.to_string()),
                |_| None,
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "body: {body}");
        }
    }

    #[test]
    fn missing_api_key_everywhere_is_a_startup_error() {
        let err =
            load_config_from_sources(Some(Path::new("/nowhere")), no_file, |_| None).unwrap_err();
        assert!(matches!(err, ConfigError::ApiKeyMissing));
    }

    #[test]
    fn oversize_config_is_rejected() {
        let big = format!("api_key = \"k\"\n# {}", "x".repeat(MAX_CONFIG_BYTES as usize));
        let err = load_config_from_sources(
            Some(Path::new("twiddle.toml")),
            move |_| Ok(big.clone()),
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
    }

    #[test]
    fn unknown_keys_fail_parsing() {
        let err = load_config_from_sources(
            Some(Path::new("twiddle.toml")),
            |_| Ok("api_key = \"k\"\nshell = true".to_string()),
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn secret_string_hides_its_value_from_debug() {
        let secret = SecretString::new("sk-abc".to_string());
        assert_eq!(format!("{secret:?}"), "SecretString(***)");
        assert_eq!(secret.expose(), "sk-abc");
    }
}
