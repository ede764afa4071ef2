//! The I/O backend (§4.2, §5): the single point where a program's effects
//! (`print`, `input`) cross into the host. Capability gating is enforced
//! here, not scattered through the evaluator (§9).

use crate::runtime_error::{RuntimeError, RuntimeErrorKind};
use std::collections::VecDeque;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub deny_input: bool,
    pub deny_print: bool,
}

pub trait IoBackend {
    fn write_stdout(&mut self, text: &str) -> Result<(), RuntimeError>;
    fn read_line(&mut self, prompt: Option<&str>) -> Result<String, RuntimeError>;
}

/// Discards all writes and never has input to offer. Used for benchmarking
/// and for validate/fmt-style commands that never execute a program.
#[derive(Default)]
pub struct QuietIo;

impl IoBackend for QuietIo {
    fn write_stdout(&mut self, _text: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn read_line(&mut self, _prompt: Option<&str>) -> Result<String, RuntimeError> {
        Err(RuntimeError::new(RuntimeErrorKind::CapDenied { capability: "input" }))
    }
}

/// Replays a fixed stdin script; writes are discarded. Used by tests and the
/// `--scripted-stdin`-style harnesses (§5 "scripted mode").
#[derive(Default)]
pub struct ScriptedIo {
    lines: VecDeque<String>,
}

impl ScriptedIo {
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ScriptedIo { lines: lines.into_iter().map(Into::into).collect() }
    }
}

impl IoBackend for ScriptedIo {
    fn write_stdout(&mut self, _text: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn read_line(&mut self, _prompt: Option<&str>) -> Result<String, RuntimeError> {
        self.lines
            .pop_front()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::CapDenied { capability: "input" }))
    }
}

/// Writes to the real process stdout and reads from real process stdin.
pub struct StdIo {
    stdout: std::io::Stdout,
    stdin: std::io::Stdin,
}

impl Default for StdIo {
    fn default() -> Self {
        StdIo { stdout: std::io::stdout(), stdin: std::io::stdin() }
    }
}

impl IoBackend for StdIo {
    fn write_stdout(&mut self, text: &str) -> Result<(), RuntimeError> {
        let mut lock = self.stdout.lock();
        lock.write_all(text.as_bytes())
            .and_then(|_| lock.flush())
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::TypeRuntime { message: format!("stdout write failed: {e}") }))
    }

    fn read_line(&mut self, prompt: Option<&str>) -> Result<String, RuntimeError> {
        if let Some(p) = prompt {
            print!("{p}");
            let _ = std::io::stdout().flush();
        }
        let mut buf = String::new();
        self.stdin
            .lock()
            .read_line(&mut buf)
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::TypeRuntime { message: format!("stdin read failed: {e}") }))?;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(buf)
    }
}

/// Captures stdout into an in-memory buffer and replays a fixed stdin
/// script — used by `run`'s `--quiet`-with-capture tests and the CLI's own
/// regression suite.
#[derive(Default)]
pub struct BufferedIo {
    pub output: String,
    input: VecDeque<String>,
}

impl BufferedIo {
    pub fn new(input: impl IntoIterator<Item = impl Into<String>>) -> Self {
        BufferedIo { output: String::new(), input: input.into_iter().map(Into::into).collect() }
    }
}

impl IoBackend for BufferedIo {
    fn write_stdout(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.output.push_str(text);
        Ok(())
    }

    fn read_line(&mut self, _prompt: Option<&str>) -> Result<String, RuntimeError> {
        self.input
            .pop_front()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::CapDenied { capability: "input" }))
    }
}
