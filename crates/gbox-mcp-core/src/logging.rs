//! Protocol-aware session logger.
//!
//! Tool handlers log through an [`McpLogger`]. Where the records end up depends
//! on the transport: HTTP sessions write them to `tracing`, while the
//! direct-pipe transport cannot use a side channel (stdout carries the
//! protocol) and instead forwards them to the client as MCP logging
//! notifications via [`McpLogger::channel`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Log severity, following the MCP logging levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug-level messages
    Debug,
    /// Informational messages
    Info,
    /// Normal but significant conditions
    Notice,
    /// Warning conditions
    Warning,
    /// Error conditions
    Error,
    /// Critical conditions
    Critical,
    /// Action must be taken immediately
    Alert,
    /// System is unusable
    Emergency,
}

/// A single log entry emitted by a session.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Name of the emitting logger
    pub logger: String,
    /// Human readable message
    pub message: String,
    /// Optional structured payload
    pub data: Option<Value>,
}

impl LogRecord {
    /// Message and data merged into one JSON value, as carried by MCP
    /// logging notifications.
    pub fn payload(&self) -> Value {
        match &self.data {
            Some(data) => serde_json::json!({ "message": self.message, "data": data }),
            None => Value::String(self.message.clone()),
        }
    }
}

#[derive(Debug, Clone)]
enum LogSink {
    Tracing,
    Channel(mpsc::UnboundedSender<LogRecord>),
}

/// Logger handed to every protocol server instance.
#[derive(Debug, Clone)]
pub struct McpLogger {
    name: String,
    sink: LogSink,
}

impl McpLogger {
    /// Logger that writes to the process `tracing` subscriber.
    pub fn tracing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink: LogSink::Tracing,
        }
    }

    /// Logger that queues records for delivery over the protocol itself.
    ///
    /// The receiver must be drained by whoever owns the protocol peer.
    pub fn channel(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<LogRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let logger = Self {
            name: name.into(),
            sink: LogSink::Channel(tx),
        };
        (logger, rx)
    }

    /// Logger name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Emit a record at the given level.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        let record = LogRecord {
            level,
            logger: self.name.clone(),
            message: message.into(),
            data,
        };

        match &self.sink {
            LogSink::Tracing => emit_tracing(&record),
            LogSink::Channel(tx) => {
                // Receiver gone means the peer disconnected; fall back to stderr.
                if let Err(mpsc::error::SendError(record)) = tx.send(record) {
                    emit_tracing(&record);
                }
            }
        }
    }

    /// Emit a debug record.
    pub fn debug(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Debug, message, Some(data));
    }

    /// Emit an info record.
    pub fn info(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Info, message, Some(data));
    }

    /// Emit a warning record.
    pub fn warning(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Warning, message, Some(data));
    }

    /// Emit an error record.
    pub fn error(&self, message: impl Into<String>, data: Value) {
        self.log(LogLevel::Error, message, Some(data));
    }
}

fn emit_tracing(record: &LogRecord) {
    let data = record
        .data
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();
    let logger = record.logger.as_str();
    let message = record.message.as_str();

    match record.level {
        LogLevel::Debug => tracing::debug!(logger, data = %data, "{message}"),
        LogLevel::Info | LogLevel::Notice => tracing::info!(logger, data = %data, "{message}"),
        LogLevel::Warning | LogLevel::Alert | LogLevel::Emergency => {
            tracing::warn!(logger, data = %data, "{message}")
        }
        LogLevel::Error | LogLevel::Critical => tracing::error!(logger, data = %data, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_channel_logger_queues_records() {
        let (logger, mut rx) = McpLogger::channel("gbox-android");
        logger.info("Tap command invoked", json!({ "boxId": "b1" }));
        logger.log(LogLevel::Notice, "plain", None);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.level, LogLevel::Info);
        assert_eq!(first.logger, "gbox-android");
        assert_eq!(first.message, "Tap command invoked");
        assert_eq!(first.data, Some(json!({ "boxId": "b1" })));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.level, LogLevel::Notice);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_logger_survives_closed_receiver() {
        let (logger, rx) = McpLogger::channel("gbox-linux");
        drop(rx);
        logger.error("still fine", json!({}));
    }

    #[test]
    fn test_payload_shape() {
        let record = LogRecord {
            level: LogLevel::Warning,
            logger: "x".to_string(),
            message: "hello".to_string(),
            data: Some(json!({ "k": 1 })),
        };
        assert_eq!(record.payload(), json!({ "message": "hello", "data": { "k": 1 } }));

        let bare = LogRecord { data: None, ..record };
        assert_eq!(bare.payload(), json!("hello"));
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Emergency);
        assert_eq!(serde_json::to_string(&LogLevel::Warning).unwrap(), "\"warning\"");
    }
}
