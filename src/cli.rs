//! CLI argument parsing via clap.

use clap::Parser;

/// An interactive terminal coding agent for OpenAI-compatible APIs.
#[derive(Debug, Parser)]
#[command(name = "twiddle", version, about)]
pub struct Args {
    /// Run one headless turn with this prompt text and exit.
    #[arg(short = 'p', long = "prompt", conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// Run one headless turn reading the prompt from a file (max 512 KiB).
    #[arg(long = "prompt-file", value_name = "PATH")]
    pub prompt_file: Option<String>,
}
