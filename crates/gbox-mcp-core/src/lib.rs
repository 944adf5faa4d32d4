//! # gbox-mcp-core
//!
//! Core types for the Gbox MCP Server.
//!
//! This crate contains all fundamental types with **no internal dependencies**
//! on other gbox-mcp crates. It provides:
//!
//! - Target platforms and the per-platform tool table
//! - Session identifiers
//! - Configuration types
//! - The protocol-aware session logger
//! - Error types
//!
//! ## Architecture
//!
//! This is Layer 0 in the architecture - all other crates depend on this one,
//! but this crate has no dependencies on other gbox-mcp crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod session;

// Re-export commonly used types
pub use config::{DeviceSettings, ServerConfig, ServerSettings, TransportMode, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use logging::{LogLevel, LogRecord, McpLogger};
pub use platform::Platform;
pub use session::SessionId;
