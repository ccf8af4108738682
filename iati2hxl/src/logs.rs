//! Progress logging.
//!
//! Stdout carries CSV, so every log line goes to stderr, either as a
//! human-readable line or as one JSON object per line.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Success,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warning,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Error,
            message: message.into(),
            indent: 0,
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Human-readable rendering, without trailing newline.
    pub fn render(&self) -> String {
        let prefix = match self.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let indent = "   ".repeat(self.indent as usize);
        format!("{}{} {}", indent, prefix, self.message)
    }
}

/// How entries are written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
    Silent,
}

/// Global logger
pub static LOGGER: Lazy<Logger> = Lazy::new(Logger::default);

/// Writes entries to stderr.
#[derive(Debug, Default)]
pub struct Logger {
    format: Mutex<LogFormat>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format: Mutex::new(format),
        }
    }

    pub fn set_format(&self, format: LogFormat) {
        if let Ok(mut current) = self.format.lock() {
            *current = format;
        }
    }

    pub fn format(&self) -> LogFormat {
        self.format.lock().map(|f| *f).unwrap_or_default()
    }

    /// Emit an entry in the current format.
    pub fn log(&self, entry: LogEntry) {
        match self.format() {
            LogFormat::Human => eprintln!("{}", entry.render()),
            LogFormat::Json => {
                if let Ok(line) = serde_json::to_string(&entry) {
                    eprintln!("{}", line);
                }
            }
            LogFormat::Silent => {}
        }
    }
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    LOGGER.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOGGER.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOGGER.log(LogEntry::warning(msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOGGER.log(LogEntry::error(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOGGER.log(LogEntry::info(msg).with_indent(indent));
}

pub fn set_log_format(format: LogFormat) {
    LOGGER.set_format(format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefixes() {
        assert_eq!(LogEntry::info("hello").render(), "    hello");
        assert_eq!(LogEntry::success("done").render(), "   ✓ done");
        assert_eq!(LogEntry::error("x").with_indent(1).render(), "      ❌ x");
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(LogEntry::warning("slow").with_indent(2)).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "slow");
        assert_eq!(json["indent"], 2);
    }

    #[test]
    fn test_format_switch() {
        let logger = Logger::new(LogFormat::Human);
        logger.set_format(LogFormat::Silent);
        assert_eq!(logger.format(), LogFormat::Silent);
    }
}
