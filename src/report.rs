//! Per-run operation log.
//!
//! A `RunReport` is owned by one invocation and threaded through every stage.
//! Each message is forwarded to `tracing` and kept in order with a local
//! timestamp; error messages are also collected separately so the run can end
//! with a summary of everything that went wrong.

use chrono::Local;
use serde::Serialize;
use std::fmt;

/// Severity of a report entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One timestamped line of the operation log
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Local wall-clock time, `HH:MM:SS`
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.level, self.message)
    }
}

/// Append-only log of one renumbering run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    entries: Vec<LogEntry>,
    errors: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{}", message);
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.push(LogLevel::Warn, message);
    }

    /// Log an error and keep it for the end-of-run summary
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.errors.push(message.clone());
        self.push(LogLevel::Error, message);
    }

    fn push(&mut self, level: LogLevel, message: String) {
        self.entries.push(LogEntry {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            level,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Messages only, in order (timestamps stripped)
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }

    /// Log the closing summary: operation count and every collected error
    pub fn summarize(&mut self) {
        let logged = self.entries.len();
        let errors = self.errors.clone();

        self.info("=".repeat(60));
        self.info("OPERATION SUMMARY");
        self.info("=".repeat(60));
        self.info(format!("Total operations logged: {}", logged));
        self.info(format!("Errors encountered: {}", errors.len()));
        if !errors.is_empty() {
            self.info("ERRORS:");
            for error in &errors {
                self.info(format!("  - {}", error));
            }
        }
    }
}
