//! Seams between the session manager and the rest of the server.

use std::sync::Arc;

use gbox_mcp_core::{McpLogger, Platform, Result, SessionId};

/// Live connection owned by a session.
///
/// Implementations must make [`close`](SessionTransport::close) idempotent;
/// the manager calls it on every removal path, and transports typically call
/// back into the manager when they close on their own.
pub trait SessionTransport: Send + Sync + 'static {
    /// Whether the transport has been closed.
    fn is_closed(&self) -> bool;

    /// Close the transport and release its resources.
    fn close(&self);
}

/// Builds the per-session collaborators for one platform.
pub trait SessionBackend: Send + Sync + 'static {
    /// Protocol server instance, built once per session.
    type Server: Send + Sync + 'static;
    /// Device-automation client handle.
    type Client: Send + Sync + 'static;
    /// Client-supplied connection options.
    type ClientOptions: Send + 'static;
    /// Transport handle stored in each session.
    type Transport: SessionTransport;

    /// Platform every session of this backend targets.
    fn platform(&self) -> Platform;

    /// Create the device client, using defaults when no options are supplied.
    fn create_client(&self, options: Option<Self::ClientOptions>) -> Result<Self::Client>;

    /// Create the logger for a new session.
    fn create_logger(&self, session_id: &SessionId) -> McpLogger {
        McpLogger::tracing(format!("{}-{}", self.platform(), session_id))
    }

    /// Build the protocol server for a new session with the full tool and
    /// prompt registry of this backend's platform attached.
    fn create_server(
        &self,
        session_id: &SessionId,
        client: Arc<Self::Client>,
        logger: McpLogger,
    ) -> Self::Server;
}
