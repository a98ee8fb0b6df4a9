//! Input log records and severity levels.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A structured log record as received from the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub level: String,
    /// Free text; callers may send `null` or omit it entirely.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl LogRecord {
    pub fn new(id: &str, level: &str, message: &str, source: &str) -> Self {
        Self {
            id: id.to_string(),
            timestamp: String::new(),
            level: level.to_string(),
            message: Some(message.to_string()),
            source: source.to_string(),
            metadata: HashMap::new(),
        }
    }

    /// The message text, empty when absent.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }

    pub fn level(&self) -> Level {
        Level::parse(&self.level)
    }
}

/// Severity label, parsed case-insensitively.
///
/// `Warn` and `Warning` stay distinct: they share a weight, but only the
/// short form participates in the warn-with-error-keyword rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Warning,
    Error,
    Fatal,
    Critical,
    Unknown,
}

impl Level {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "DEBUG" => Level::Debug,
            "INFO" => Level::Info,
            "WARN" => Level::Warn,
            "WARNING" => Level::Warning,
            "ERROR" => Level::Error,
            "FATAL" => Level::Fatal,
            "CRITICAL" => Level::Critical,
            _ => Level::Unknown,
        }
    }

    /// Numeric severity weight; higher is more severe.
    pub fn weight(self) -> u8 {
        match self {
            Level::Debug => 1,
            Level::Info => 2,
            Level::Warn | Level::Warning => 4,
            Level::Error => 8,
            Level::Fatal | Level::Critical => 10,
            Level::Unknown => 0,
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, Level::Error | Level::Fatal | Level::Critical)
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Debug => write!(f, "DEBUG"),
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Warning => write!(f, "WARNING"),
            Level::Error => write!(f, "ERROR"),
            Level::Fatal => write!(f, "FATAL"),
            Level::Critical => write!(f, "CRITICAL"),
            Level::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_weights() {
        assert_eq!(Level::parse("debug").weight(), 1);
        assert_eq!(Level::parse("INFO").weight(), 2);
        assert_eq!(Level::parse("Warn").weight(), 4);
        assert_eq!(Level::parse("WARNING").weight(), 4);
        assert_eq!(Level::parse("error").weight(), 8);
        assert_eq!(Level::parse("FATAL").weight(), 10);
        assert_eq!(Level::parse("critical").weight(), 10);
        assert_eq!(Level::parse("trace").weight(), 0);
    }

    #[test]
    fn test_error_levels() {
        assert!(Level::Error.is_error());
        assert!(Level::Fatal.is_error());
        assert!(Level::Critical.is_error());
        assert!(!Level::Warn.is_error());
        assert!(!Level::Unknown.is_error());
    }

    #[test]
    fn test_missing_message_deserializes() {
        let rec: LogRecord =
            serde_json::from_str(r#"{"id":"1","level":"INFO","message":null}"#).unwrap();
        assert_eq!(rec.message(), "");
        assert!(rec.metadata.is_empty());
    }
}
