//! Gbox MCP Server Library
//!
//! Protocol server, device client, tool catalog and transports.
//! The server binary is in main.rs.

pub mod device;
pub mod protocol;
pub mod tools;
pub mod transport;

// Re-export commonly used types
pub use device::{ClientOptions, GboxClient};
pub use protocol::{DeviceMcpServer, GboxBackend, ServerDescriptor, ServerFactory};
pub use transport::{build_router, Managers, StreamableHttpTransport};

use gbox_mcp_core::ServerConfig;
use gbox_mcp_session::{SessionManager, SessionManagerConfig};

/// One session manager per platform enabled in `config`.
pub fn build_managers(config: &ServerConfig) -> Managers {
    let manager_config = SessionManagerConfig::from(&config.server);
    config
        .server
        .platforms
        .iter()
        .map(|&platform| {
            let backend = GboxBackend::new(
                ServerDescriptor::for_platform(&config.server, platform),
                config.device.clone(),
            );
            (
                platform,
                SessionManager::with_config(backend, manager_config.clone()),
            )
        })
        .collect()
}
