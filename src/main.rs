//! CLI entry point for twiddle.

use clap::Parser;
use twiddle::api::ChatClient;
use twiddle::cli::Args;
use twiddle::config::load_config;
use twiddle::render::Renderer;
use twiddle::sandbox::Sandbox;
use twiddle::session::{tool_context, SessionRunner, SYSTEM_PROMPT};
use twiddle::tools::executor::ToolExecutor;
use std::io::{BufRead, Write};

/// Prompt files larger than this are refused.
const MAX_PROMPT_FILE_BYTES: u64 = 512 * 1024;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let renderer = Renderer::new(Renderer::color_from_env());

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            renderer.error(&e.to_string());
            std::process::exit(1);
        }
    };

    // The sandbox root is the directory twiddle was started in.
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            renderer.error(&format!("cannot determine working directory: {e}"));
            std::process::exit(1);
        }
    };
    let sandbox = match Sandbox::new(&cwd, config.sandbox_mode) {
        Ok(sandbox) => sandbox,
        Err(e) => {
            renderer.error(&e.to_string());
            std::process::exit(1);
        }
    };

    let client = ChatClient::new(&config, SYSTEM_PROMPT.to_string(), tool_context(&sandbox));
    let executor = ToolExecutor::new(sandbox);
    let debug_payloads = std::env::var_os("TWIDDLE_DEBUG").is_some();
    let mut runner = SessionRunner::new(
        client,
        executor,
        config.approval_policy,
        renderer,
        debug_payloads,
    );

    let headless_prompt = match resolve_headless_prompt(&args) {
        Ok(prompt) => prompt,
        Err(msg) => {
            renderer.error(&msg);
            std::process::exit(1);
        }
    };

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    if let Some(prompt) = headless_prompt {
        let mut input = stdin.lock();
        if let Err(e) = runner.run_prompt(&prompt, &mut input, &mut stdout).await {
            renderer.error(&e.to_string());
            std::process::exit(1);
        }
        return;
    }

    // Interactive REPL: one conversation until `exit` or EOF.
    loop {
        renderer.repl_prompt();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                renderer.error(&format!("failed to read input: {e}"));
                break;
            }
        }

        let input_line = line.trim();
        if input_line.is_empty() {
            continue;
        }
        if input_line == "exit" {
            break;
        }

        let prompt = input_line.to_string();
        let mut input = stdin.lock();
        if let Err(e) = runner.run_prompt(&prompt, &mut input, &mut stdout).await {
            // A failed turn rolled the conversation back; the session
            // itself continues.
            renderer.error(&e.to_string());
        }
        let _ = stdout.flush();
    }
}

/// Resolve `-p` / `--prompt-file` into a single headless prompt, if any.
fn resolve_headless_prompt(args: &Args) -> Result<Option<String>, String> {
    if let Some(prompt) = &args.prompt {
        return Ok(Some(prompt.clone()));
    }
    let Some(path) = &args.prompt_file else {
        return Ok(None);
    };

    let metadata = std::fs::metadata(path).map_err(|e| format!("prompt file {path}: {e}"))?;
    if metadata.len() > MAX_PROMPT_FILE_BYTES {
        return Err(format!(
            "prompt file {path} exceeds {MAX_PROMPT_FILE_BYTES} bytes"
        ));
    }
    let text =
        std::fs::read_to_string(path).map_err(|e| format!("prompt file {path}: {e}"))?;
    if text.trim().is_empty() {
        return Err(format!("prompt file {path} is empty"));
    }
    Ok(Some(text))
}
