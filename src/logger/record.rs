//! Log records and their renderings.
//!
//! A [`Record`] is created once at the call site and shared read-only (behind
//! an `Arc`) by every sink that receives it.

use std::fmt;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    /// Upper-case level name as it appears in every output format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured key/value attribute attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub key: String,
    pub value: Value,
}

impl Attr {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Value::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, value)
    }

    pub fn bool(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, value)
    }

    /// An `error` attribute carrying the display form of `err`.
    pub fn error(err: &dyn fmt::Display) -> Self {
        Self::string("error", err.to_string())
    }

    fn render_value(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// An immutable log record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub attrs: Vec<Attr>,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn new(level: Level, message: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Self::at(Utc::now(), level, message, attrs)
    }

    /// Create a record with an explicit timestamp.
    pub fn at(time: DateTime<Utc>, level: Level, message: impl Into<String>, attrs: Vec<Attr>) -> Self {
        Self {
            time,
            level,
            message: message.into(),
            attrs,
        }
    }

    /// RFC3339 timestamp with second precision, UTC `Z` suffix.
    pub fn rfc3339(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// `[LEVEL] - <RFC3339> - <message>` followed by any ` key=value` pairs.
    pub fn file_line(&self) -> String {
        let mut line = format!("[{}] - {} - {}", self.level, self.rfc3339(), self.message);
        self.push_attrs(&mut line);
        line
    }

    /// Console rendering: colored level tag, local wall-clock time.
    pub fn console_line(&self) -> String {
        let local = self.time.with_timezone(&Local);
        let mut line = format!(
            "{}[{}]{} - {} - {}",
            level_color(self.level),
            self.level,
            COLOR_RESET,
            local.format("%Y-%m-%d %H:%M:%S"),
            self.message
        );
        self.push_attrs(&mut line);
        line
    }

    /// Compact JSON payload published to the message bus.
    pub fn bus_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        let attrs: Map<String, Value> = self
            .attrs
            .iter()
            .map(|a| (a.key.clone(), a.value.clone()))
            .collect();
        serde_json::to_vec(&BusPayload {
            time: self.rfc3339(),
            level: self.level.as_str(),
            msg: &self.message,
            attrs,
        })
    }

    fn push_attrs(&self, line: &mut String) {
        for attr in &self.attrs {
            line.push(' ');
            line.push_str(&attr.key);
            line.push('=');
            line.push_str(&attr.render_value());
        }
    }
}

#[derive(Serialize)]
struct BusPayload<'a> {
    time: String,
    level: &'static str,
    msg: &'a str,
    #[serde(skip_serializing_if = "Map::is_empty")]
    attrs: Map<String, Value>,
}

pub const COLOR_RESET: &str = "\x1b[0m";
pub const COLOR_RED: &str = "\x1b[31m";
pub const COLOR_GREEN: &str = "\x1b[32m";
pub const COLOR_YELLOW: &str = "\x1b[33m";
pub const COLOR_BLUE: &str = "\x1b[34m";

/// ANSI color used for a level's tag on the console.
pub fn level_color(level: Level) -> &'static str {
    match level {
        Level::Debug => COLOR_BLUE,
        Level::Info => COLOR_GREEN,
        Level::Warn => COLOR_YELLOW,
        Level::Error => COLOR_RED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap()
    }

    #[test]
    fn test_level_ordering_and_names() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Warn < Level::Error);
        assert_eq!(Level::Warn.to_string(), "WARN");
    }

    #[test]
    fn test_file_line_format() {
        let record = Record::at(fixed_time(), Level::Info, "x", Vec::new());
        assert_eq!(record.file_line(), "[INFO] - 2024-05-01T12:30:45Z - x");
    }

    #[test]
    fn test_file_line_with_attrs() {
        let record = Record::at(
            fixed_time(),
            Level::Error,
            "failed",
            vec![Attr::int("user_id", 7), Attr::string("error", "boom")],
        );
        assert_eq!(
            record.file_line(),
            "[ERROR] - 2024-05-01T12:30:45Z - failed user_id=7 error=boom"
        );
    }

    #[test]
    fn test_bus_payload_schema() {
        let record = Record::at(fixed_time(), Level::Info, "x", Vec::new());
        let payload = String::from_utf8(record.bus_payload().unwrap()).unwrap();
        assert_eq!(payload, r#"{"time":"2024-05-01T12:30:45Z","level":"INFO","msg":"x"}"#);
    }

    #[test]
    fn test_bus_payload_carries_attrs() {
        let record = Record::at(fixed_time(), Level::Debug, "y", vec![Attr::bool("hit", true)]);
        let value: Value = serde_json::from_slice(&record.bus_payload().unwrap()).unwrap();
        assert_eq!(value["level"], "DEBUG");
        assert_eq!(value["attrs"]["hit"], true);
    }

    #[test]
    fn test_console_line_colors() {
        let record = Record::at(fixed_time(), Level::Warn, "careful", Vec::new());
        let line = record.console_line();
        assert!(line.starts_with("\x1b[33m[WARN]\x1b[0m - "));
        assert!(line.ends_with(" - careful"));

        let local = fixed_time().with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string();
        assert!(line.contains(&local));
    }

    #[test]
    fn test_level_colors() {
        assert_eq!(level_color(Level::Debug), COLOR_BLUE);
        assert_eq!(level_color(Level::Info), COLOR_GREEN);
        assert_eq!(level_color(Level::Error), COLOR_RED);
    }
}
