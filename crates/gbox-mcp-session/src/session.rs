//! A single MCP session.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use gbox_mcp_core::{McpLogger, Platform, SessionId};

use crate::backend::{SessionBackend, SessionTransport};

/// One client's binding to a protocol server, its transport and its device
/// client.
///
/// Everything except the last-activity timestamp is fixed at creation.
pub struct Session<B: SessionBackend> {
    id: SessionId,
    platform: Platform,
    server: B::Server,
    transport: Arc<B::Transport>,
    client: Arc<B::Client>,
    logger: McpLogger,
    created_at: Instant,
    last_activity_at: Mutex<Instant>,
}

impl<B: SessionBackend> Session<B> {
    pub(crate) fn new(
        id: SessionId,
        platform: Platform,
        server: B::Server,
        transport: Arc<B::Transport>,
        client: Arc<B::Client>,
        logger: McpLogger,
    ) -> Self {
        let now = Instant::now();
        Self {
            id,
            platform,
            server,
            transport,
            client,
            logger,
            created_at: now,
            last_activity_at: Mutex::new(now),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Platform this session targets.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Protocol server bound to this session.
    pub fn server(&self) -> &B::Server {
        &self.server
    }

    /// Transport handle fed by the router.
    pub fn transport(&self) -> &Arc<B::Transport> {
        &self.transport
    }

    /// Device client handle.
    pub fn client(&self) -> &Arc<B::Client> {
        &self.client
    }

    /// Session logger.
    pub fn logger(&self) -> &McpLogger {
        &self.logger
    }

    /// Creation time.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time of the last successful lookup.
    pub fn last_activity_at(&self) -> Instant {
        *self
            .last_activity_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the session as used now.
    pub fn touch(&self) {
        let mut last = self
            .last_activity_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        if now > *last {
            *last = now;
        }
    }

    /// Whether the session has been idle longer than `timeout`.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.idle_time() > timeout
    }

    /// Time since the last activity.
    pub fn idle_time(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity_at())
    }

    /// Time since creation.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.created_at)
    }

    pub(crate) fn close(&self) {
        self.transport.close();
    }
}

impl<B: SessionBackend> std::fmt::Debug for Session<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("platform", &self.platform)
            .field("transport_closed", &self.transport.is_closed())
            .field("age", &self.age())
            .finish_non_exhaustive()
    }
}
