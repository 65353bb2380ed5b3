//! Append-only run log mirrored to the console.
//!
//! Every status line is written to both sinks before the call returns, so the
//! file always holds the same lines as the console, in emission order. The
//! file is opened in append mode and never truncated.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::command::CommandOutput;
use crate::error::ProvisionResult;

/// Timestamp format used inside log lines and the validation report.
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format used in the log file name.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Severity tag of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "SUCCESS",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Build the run log file name for a run started at `started_at`.
pub fn log_file_name(prefix: &str, started_at: &DateTime<Local>) -> String {
    format!("{}_{}.log", prefix, started_at.format(FILE_TIMESTAMP_FORMAT))
}

/// Durable record of one provisioning run.
pub struct RunLog {
    path: PathBuf,
    file: File,
    console: Option<Box<dyn Write + Send>>,
}

impl RunLog {
    /// Create (or append to) `<dir>/<prefix>_<timestamp>.log`, mirroring to stdout.
    pub fn create(dir: &Path, prefix: &str, started_at: &DateTime<Local>) -> ProvisionResult<Self> {
        let path = dir.join(log_file_name(prefix, started_at));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file,
            console: Some(Box::new(io::stdout())),
        })
    }

    /// Replace the console sink (tests capture it, quiet mode drops it).
    pub fn with_console(mut self, console: Option<Box<dyn Write + Send>>) -> Self {
        self.console = console;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Emit one timestamped status line to both sinks.
    pub fn emit(&mut self, level: LogLevel, message: &str) -> ProvisionResult<()> {
        let line = format!(
            "[{}] {}: {}\n",
            Local::now().format(LINE_TIMESTAMP_FORMAT),
            level.as_str(),
            message
        );
        self.write_both(line.as_bytes())
    }

    pub fn info(&mut self, message: &str) -> ProvisionResult<()> {
        self.emit(LogLevel::Info, message)
    }

    pub fn success(&mut self, message: &str) -> ProvisionResult<()> {
        self.emit(LogLevel::Success, message)
    }

    pub fn warn(&mut self, message: &str) -> ProvisionResult<()> {
        self.emit(LogLevel::Warn, message)
    }

    pub fn error(&mut self, message: &str) -> ProvisionResult<()> {
        self.emit(LogLevel::Error, message)
    }

    /// Write the raw output of a finished command, framed by markers.
    pub fn command_output(&mut self, rendered: &str, output: &CommandOutput) -> ProvisionResult<()> {
        if output.stdout.is_empty() && output.stderr.is_empty() {
            return Ok(());
        }

        let mut block = format!("--- begin output: {} ---\n", rendered);
        for chunk in [&output.stdout, &output.stderr] {
            if chunk.is_empty() {
                continue;
            }
            block.push_str(chunk);
            if !chunk.ends_with('\n') {
                block.push('\n');
            }
        }
        block.push_str("--- end output ---\n");
        self.write_both(block.as_bytes())
    }

    fn write_both(&mut self, bytes: &[u8]) -> ProvisionResult<()> {
        self.file.write_all(bytes)?;
        self.file.flush()?;

        // A closed console must not cost us the audit trail.
        if let Some(console) = self.console.as_mut() {
            if console.write_all(bytes).and_then(|_| console.flush()).is_err() {
                tracing::warn!(event = "runlog.console_lost", path = %self.path.display());
                self.console = None;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog")
            .field("path", &self.path)
            .field("console", &self.console.is_some())
            .finish()
    }
}
