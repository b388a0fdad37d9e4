//! Log entries forwarded to the MOV on `valawai/log/add`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a forwarded log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a `valawai/log/add` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// The associated payload, JSON-encoded into a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
}

impl LogEntry {
    /// Build an entry, sanitizing `message` and encoding `payload`.
    pub fn new(level: LogLevel, message: &str, payload: Option<&Value>) -> Self {
        Self {
            level,
            message: sanitize_message(message),
            payload: payload.map(Value::to_string),
            component_id: None,
        }
    }

    pub fn with_component_id(mut self, component_id: Option<String>) -> Self {
        self.component_id = component_id;
        self
    }
}

/// Replace every `{` with a space; the MOV treats braces in messages as
/// template markers.
pub fn sanitize_message(message: &str) -> String {
    message.replace('{', " ")
}
