//! Direct-pipe transport.
//!
//! One protocol server for the whole process, speaking over stdin/stdout.
//! Session logs cannot go to stdout, so they are forwarded to the client as
//! MCP logging notifications.

use std::sync::Arc;

use rmcp::model::{LoggingLevel, LoggingMessageNotificationParam};
use rmcp::service::{Peer, RoleServer};
use rmcp::{transport::stdio, ServiceExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use gbox_mcp_core::{LogLevel, LogRecord, McpLogger, ServerConfig};

use crate::device::GboxClient;
use crate::protocol::{ServerDescriptor, ServerFactory};

/// MCP logging level for a session log level.
pub fn logging_level(level: LogLevel) -> LoggingLevel {
    match level {
        LogLevel::Debug => LoggingLevel::Debug,
        LogLevel::Info => LoggingLevel::Info,
        LogLevel::Notice => LoggingLevel::Notice,
        LogLevel::Warning => LoggingLevel::Warning,
        LogLevel::Error => LoggingLevel::Error,
        LogLevel::Critical => LoggingLevel::Critical,
        LogLevel::Alert => LoggingLevel::Alert,
        LogLevel::Emergency => LoggingLevel::Emergency,
    }
}

fn notification(record: &LogRecord) -> LoggingMessageNotificationParam {
    LoggingMessageNotificationParam {
        level: logging_level(record.level),
        logger: Some(record.logger.clone()),
        data: record.payload(),
    }
}

async fn forward_logs(peer: Peer<RoleServer>, mut records: mpsc::UnboundedReceiver<LogRecord>) {
    while let Some(record) = records.recv().await {
        if let Err(e) = peer.notify_logging_message(notification(&record)).await {
            debug!("Failed to forward log record: {}", e);
            break;
        }
    }
}

/// Serve the configured platform over stdin/stdout until the client disconnects.
pub async fn run(config: &ServerConfig) -> anyhow::Result<()> {
    let platform = config.server.platform;
    let descriptor = ServerDescriptor::for_platform(&config.server, platform);
    let client = Arc::new(GboxClient::new(&config.device, None)?);
    let (logger, records) = McpLogger::channel(platform.name());

    let server = ServerFactory::create_server(&descriptor, None, client, logger);
    info!(
        "Starting {} on stdio with {} tools",
        server.name(),
        server.tool_names().len()
    );

    let service = server.serve(stdio()).await.map_err(|e| {
        tracing::error!("Error starting server: {}", e);
        e
    })?;

    let forwarder = tokio::spawn(forward_logs(service.peer().clone(), records));

    service.waiting().await?;
    forwarder.abort();

    info!("Stdio session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_mapping() {
        assert_eq!(logging_level(LogLevel::Debug), LoggingLevel::Debug);
        assert_eq!(logging_level(LogLevel::Warning), LoggingLevel::Warning);
        assert_eq!(logging_level(LogLevel::Emergency), LoggingLevel::Emergency);
    }

    #[test]
    fn test_notification_carries_logger_and_payload() {
        let record = LogRecord {
            level: LogLevel::Info,
            logger: "android".to_string(),
            message: "Tap".to_string(),
            data: Some(json!({ "x": 1 })),
        };

        let param = notification(&record);
        assert_eq!(param.level, LoggingLevel::Info);
        assert_eq!(param.logger.as_deref(), Some("android"));
        assert_eq!(param.data["message"], "Tap");
        assert_eq!(param.data["data"]["x"], 1);
    }
}
