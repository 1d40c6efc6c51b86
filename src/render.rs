//! Terminal rendering: status lines on stderr, streamed model text on
//! stdout, and the spinner shown while waiting for the first byte of a
//! response.
//!
//! The spinner owns a background thread writing single-line frames
//! terminated by a carriage return. [`TurnWriter`] wraps stdout for one turn
//! and stops the spinner before the first non-spinner byte reaches the
//! terminal, so frames and model output never interleave.

use crate::tokens::ContextUsage;
use crossterm::style::{Color, Stylize};
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SPINNER_FRAMES: &[char] = &['|', '/', '-', '\\'];
const SPINNER_TICK_MS: u64 = 120;
/// ANSI clear-to-end-of-line after returning to column zero.
const CLEAR_LINE: &str = "\r\x1b[2K";

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Stderr line renderer with optional ANSI color.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// True unless `NO_COLOR` is set or stderr is not a terminal.
    pub fn color_from_env() -> bool {
        std::env::var_os("NO_COLOR").is_none() && io::stderr().is_terminal()
    }

    pub fn error(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", "error:".with(Color::Red).bold());
        } else {
            eprintln!("error: {msg}");
        }
    }

    pub fn warn(&self, msg: &str) {
        if self.color {
            eprintln!("{} {msg}", "warning:".with(Color::Yellow));
        } else {
            eprintln!("warning: {msg}");
        }
    }

    /// One-line tool dispatch outcome, e.g. `tool:read_file success (42 lines)`.
    pub fn tool_summary(&self, line: &str) {
        if self.color {
            eprintln!("{}", line.with(Color::DarkGrey));
        } else {
            eprintln!("{line}");
        }
    }

    /// Raw tool payload dump shown after the summary when TWIDDLE_DEBUG is set.
    pub fn debug_payload(&self, payload: &str) {
        if self.color {
            eprintln!("{}", payload.with(Color::DarkGrey));
        } else {
            eprintln!("{payload}");
        }
    }

    /// Visible retry notice between the failed attempt and its retry.
    pub fn retrying(&self) {
        if self.color {
            eprintln!("{}", "…retrying…".with(Color::Yellow));
        } else {
            eprintln!("…retrying…");
        }
    }

    /// End-of-turn context-window summary.
    pub fn context_usage(&self, usage: &ContextUsage) {
        let line = format!("context: {}", usage.summary());
        if self.color {
            eprintln!("{}", line.with(Color::DarkGrey));
        } else {
            eprintln!("{line}");
        }
    }

    /// Interactive prompt chrome, written to stdout without a newline.
    pub fn repl_prompt(&self) {
        let mut out = io::stdout();
        if self.color {
            let _ = write!(out, "{} ", "twiddle>".with(Color::Cyan).bold());
        } else {
            let _ = write!(out, "twiddle> ");
        }
        let _ = out.flush();
    }

    /// Start a spinner on stderr; returns a handle that stops it on drop.
    pub fn spinner(&self, label: &str) -> SpinnerHandle {
        start_spinner(label, self.color)
    }
}

// ---------------------------------------------------------------------------
// Spinner
// ---------------------------------------------------------------------------

/// RAII handle for the spinner thread.
pub struct SpinnerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl SpinnerHandle {
    fn disabled() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(true)),
            thread: None,
        }
    }

    /// Stop the spinner thread and clear its line.
    pub fn finish(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SpinnerHandle {
    fn drop(&mut self) {
        self.finish();
    }
}

fn start_spinner(label: &str, color: bool) -> SpinnerHandle {
    if !io::stderr().is_terminal() {
        return SpinnerHandle::disabled();
    }

    let label = label.to_string();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let spawned = thread::Builder::new()
        .name("twiddle-spinner".to_string())
        .spawn(move || {
            let mut idx = 0usize;
            while !stop_flag.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let mut err = io::stderr();
                let line = if color {
                    format!("\r{} {}", format!("[{frame}]").with(Color::Cyan), label)
                } else {
                    format!("\r[{frame}] {label}")
                };
                let _ = write!(err, "{line}");
                let _ = err.flush();
                idx += 1;
                thread::sleep(Duration::from_millis(SPINNER_TICK_MS));
            }
            let mut err = io::stderr();
            let _ = write!(err, "{CLEAR_LINE}");
            let _ = err.flush();
        });

    match spawned {
        Ok(thread) => SpinnerHandle {
            stop,
            thread: Some(thread),
        },
        // A spinner that fails to start is cosmetic; the turn proceeds.
        Err(_) => SpinnerHandle::disabled(),
    }
}

// ---------------------------------------------------------------------------
// TurnWriter
// ---------------------------------------------------------------------------

/// Display writer for one streamed turn.
///
/// The first write stops the spinner so no frame byte can land after model
/// output has started.
pub struct TurnWriter<W: Write> {
    inner: W,
    spinner: Option<SpinnerHandle>,
}

impl<W: Write> TurnWriter<W> {
    pub fn new(inner: W, spinner: Option<SpinnerHandle>) -> Self {
        Self { inner, spinner }
    }

    fn stop_spinner(&mut self) {
        if let Some(mut spinner) = self.spinner.take() {
            spinner.finish();
        }
    }
}

impl<W: Write> Write for TurnWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !buf.is_empty() {
            self.stop_spinner();
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for TurnWriter<W> {
    fn drop(&mut self) {
        self.stop_spinner();
        let _ = self.inner.flush();
    }
}
