//! Context-window accounting.
//!
//! Exact counts come from the API's `usage` field when the server sends one;
//! the window size itself comes from a small model-name catalog since
//! OpenAI-compatible providers do not report it.

use crate::types::Usage;

/// Fallback window for models the catalog doesn't know.
const DEFAULT_CONTEXT_WINDOW: u64 = 128_000;

/// Known model-family prefixes and their context windows.
///
/// First match wins; longer prefixes come first where families overlap.
const CONTEXT_WINDOWS: &[(&str, u64)] = &[
    ("openai/gpt-5", 400_000),
    ("openai/gpt-4.1", 1_047_576),
    ("openai/gpt-4o", 128_000),
    ("gpt-5", 400_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4o", 128_000),
    ("anthropic/claude", 200_000),
    ("claude", 200_000),
    ("deepseek", 128_000),
    ("qwen", 131_072),
    ("mistral", 128_000),
];

/// Look up the context window for a model id.
pub fn context_window_for(model: &str) -> u64 {
    let normalized = model.trim().to_ascii_lowercase();
    for (prefix, window) in CONTEXT_WINDOWS {
        if normalized.starts_with(prefix) {
            return *window;
        }
    }
    DEFAULT_CONTEXT_WINDOW
}

/// End-of-turn context consumption derived from server-reported usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextUsage {
    pub used_tokens: u64,
    pub limit_tokens: u64,
    /// Remaining window in hundredths of a percent: 7500 means 75.00% free.
    pub remaining_hundredths: u64,
}

impl ContextUsage {
    /// Compute remaining context from a window size and tokens used.
    ///
    /// `remaining_hundredths = floor((limit - used) * 10000 / limit)` while
    /// `used < limit`; a window that is full or overfull reports 0.
    pub fn compute(limit_tokens: u64, used_tokens: u64) -> Self {
        let remaining_hundredths = if limit_tokens == 0 || used_tokens >= limit_tokens {
            0
        } else {
            (limit_tokens - used_tokens) * 10_000 / limit_tokens
        };
        Self {
            used_tokens,
            limit_tokens,
            remaining_hundredths,
        }
    }

    /// Compute from a turn's usage snapshot, if the server sent a valid one.
    pub fn from_usage(limit_tokens: u64, usage: &Usage) -> Option<Self> {
        usage
            .valid
            .then(|| Self::compute(limit_tokens, usage.total_tokens))
    }

    /// Render as `NN.NN% context left`.
    pub fn summary(&self) -> String {
        format!(
            "{}.{:02}% context left ({} / {} tokens used)",
            self.remaining_hundredths / 100,
            self.remaining_hundredths % 100,
            self.used_tokens,
            self.limit_tokens
        )
    }
}
