//! Error types for the Gbox MCP Server.

use thiserror::Error;

use crate::SessionId;

/// Main error type for Gbox MCP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Session not found
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// Session limit reached
    #[error("Maximum number of sessions reached (max: {0})")]
    SessionLimitReached(usize),

    /// Platform name is not one of the supported targets
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The session transport has already been closed
    #[error("Transport closed")]
    TransportClosed,

    /// Failure while moving protocol messages through a transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Failure reported by the device-automation client
    #[error("Device client error: {0}")]
    DeviceClient(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
