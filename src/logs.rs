//! Console logging helpers for pipeline progress.
//!
//! Prints leveled, prefixed lines to stdout as the import advances.
//! Not to be confused with the durable audit logs in [`crate::import::audit`].

use serde::{Deserialize, Serialize};

/// Log level for console display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Info, message: message.into() }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Success, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: LogLevel::Error, message: message.into() }
    }

    pub fn print(&self) {
        let prefix = match self.level {
            LogLevel::Info => "  ",
            LogLevel::Success => "✓ ",
            LogLevel::Warning => "⚠️ ",
            LogLevel::Error => "❌ ",
        };
        println!("{}{}", prefix, self.message);
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LogEntry::info(msg).print();
}

pub fn log_success(msg: impl Into<String>) {
    LogEntry::success(msg).print();
}

pub fn log_warning(msg: impl Into<String>) {
    LogEntry::warning(msg).print();
}

pub fn log_error(msg: impl Into<String>) {
    LogEntry::error(msg).print();
}
