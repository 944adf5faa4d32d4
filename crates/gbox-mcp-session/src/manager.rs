//! Session manager for coordinating the MCP sessions of one platform.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use gbox_mcp_core::{Error, Platform, Result, ServerSettings, SessionId};

use crate::backend::{SessionBackend, SessionTransport};
use crate::session::Session;

/// Configuration for session manager.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Idle time after which a session is swept
    pub session_timeout: Duration,

    /// Maximum number of concurrent sessions
    pub max_sessions: usize,

    /// Period of the expiry sweep
    pub sweep_interval: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(120 * 60),
            max_sessions: 1000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl From<&ServerSettings> for SessionManagerConfig {
    fn from(settings: &ServerSettings) -> Self {
        Self {
            session_timeout: settings.session_timeout(),
            max_sessions: settings.max_sessions,
            sweep_interval: settings.sweep_interval(),
        }
    }
}

struct Inner<B: SessionBackend> {
    backend: B,
    config: SessionManagerConfig,
    sessions: Mutex<HashMap<SessionId, Arc<Session<B>>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<B: SessionBackend> Drop for Inner<B> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

/// Owner of all sessions of one platform.
///
/// Cloning is cheap and yields a handle to the same session map.
pub struct SessionManager<B: SessionBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: SessionBackend> Clone for SessionManager<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: SessionBackend> SessionManager<B> {
    /// Create a new session manager with default configuration.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SessionManagerConfig::default())
    }

    /// Create a new session manager with custom configuration.
    pub fn with_config(backend: B, config: SessionManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                sessions: Mutex::new(HashMap::new()),
                sweeper: Mutex::new(None),
            }),
        }
    }

    /// Platform served by this manager.
    pub fn platform(&self) -> Platform {
        self.inner.backend.platform()
    }

    /// Manager policy.
    pub fn config(&self) -> &SessionManagerConfig {
        &self.inner.config
    }

    /// Backend used to build sessions.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Handle that does not keep the manager alive.
    pub fn downgrade(&self) -> WeakSessionManager<B> {
        WeakSessionManager {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<Session<B>>>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a session, or refresh and return the one already bound to `id`.
    ///
    /// The existence check, capacity check and insertion happen under one
    /// lock, so concurrent calls for the same id yield a single session.
    /// A session whose transport has closed is replaced.
    pub fn create_session(
        &self,
        id: SessionId,
        transport: Arc<B::Transport>,
        options: Option<B::ClientOptions>,
    ) -> Result<Arc<Session<B>>> {
        let mut sessions = self.sessions();

        let stale = match sessions.get(&id) {
            Some(existing) if !existing.transport().is_closed() => {
                existing.touch();
                debug!("Reusing existing session: session_id={}", id);
                return Ok(Arc::clone(existing));
            }
            Some(_) => sessions.remove(&id),
            None => None,
        };

        let created = self.insert_session(&mut sessions, id, transport, options);
        drop(sessions);

        // Closing may call back into the manager, so it happens after unlocking.
        if let Some(stale) = stale {
            debug!("Replaced session with closed transport: session_id={}", stale.id());
            stale.close();
        }

        let session = created?;
        self.ensure_sweeper();

        info!(
            "Session created: platform={}, session_id={}, active_sessions={}",
            self.platform(),
            session.id(),
            self.session_count()
        );

        Ok(session)
    }

    fn insert_session(
        &self,
        sessions: &mut HashMap<SessionId, Arc<Session<B>>>,
        id: SessionId,
        transport: Arc<B::Transport>,
        options: Option<B::ClientOptions>,
    ) -> Result<Arc<Session<B>>> {
        let max_sessions = self.inner.config.max_sessions;
        if sessions.len() >= max_sessions {
            warn!(
                "Session limit reached: platform={}, max_sessions={}",
                self.platform(),
                max_sessions
            );
            return Err(Error::SessionLimitReached(max_sessions));
        }

        let backend = &self.inner.backend;
        let client = Arc::new(backend.create_client(options)?);
        let logger = backend.create_logger(&id);
        let server = backend.create_server(&id, Arc::clone(&client), logger.clone());

        let session = Arc::new(Session::new(
            id.clone(),
            backend.platform(),
            server,
            transport,
            client,
            logger,
        ));
        sessions.insert(id, Arc::clone(&session));
        Ok(session)
    }

    /// Look up a session, refreshing its activity timestamp on hit.
    pub fn get_session(&self, id: &SessionId) -> Option<Arc<Session<B>>> {
        let session = self.sessions().get(id).cloned()?;

        if session.transport().is_closed() {
            debug!("Dropping session with closed transport: session_id={}", id);
            self.destroy_session(id);
            return None;
        }

        session.touch();
        Some(session)
    }

    /// Remove a session and close its transport.
    ///
    /// Returns whether a session was removed; absent ids are a no-op.
    pub fn destroy_session(&self, id: &SessionId) -> bool {
        // Closing may call back into the manager, so the map lock is released first.
        let removed = self.sessions().remove(id);

        match removed {
            Some(session) => {
                session.close();
                info!(
                    "Session destroyed: platform={}, session_id={}, age={:?}",
                    self.platform(),
                    id,
                    session.age()
                );
                true
            }
            None => false,
        }
    }

    /// Destroy every session idle longer than the configured timeout, and any
    /// whose transport has already closed.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired_sessions(&self) -> usize {
        let timeout = self.inner.config.session_timeout;

        let expired: Vec<SessionId> = self
            .sessions()
            .iter()
            .filter(|(_, session)| {
                session.is_expired(timeout) || session.transport().is_closed()
            })
            .map(|(id, _)| id.clone())
            .collect();

        let removed = expired
            .iter()
            .filter(|id| self.destroy_session(id))
            .count();

        if removed > 0 {
            info!(
                "Cleaned up {} expired sessions: platform={}",
                removed,
                self.platform()
            );
        }

        removed
    }

    /// Stop the sweep and destroy every session. Intended for shutdown.
    pub fn destroy(&self) {
        if let Some(handle) = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        let ids: Vec<SessionId> = self.sessions().keys().cloned().collect();
        for id in &ids {
            self.destroy_session(id);
        }

        info!(
            "Session manager destroyed: platform={}, sessions_closed={}",
            self.platform(),
            ids.len()
        );
    }

    /// Get the number of active sessions.
    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// List all active sessions.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions()
            .values()
            .map(|session| SessionInfo {
                session_id: session.id().clone(),
                platform: session.platform(),
                age: session.age(),
                idle: session.idle_time(),
            })
            .collect()
    }

    /// Whether the expiry sweep is running.
    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn ensure_sweeper(&self) {
        let mut sweeper = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if sweeper.is_some() {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime available; expired sessions will not be swept");
            return;
        };

        let period = self.inner.config.sweep_interval;
        debug!(
            "Starting expiry sweep: platform={}, period={:?}",
            self.platform(),
            period
        );
        *sweeper = Some(runtime.spawn(run_sweeper(self.downgrade(), period)));
    }
}

async fn run_sweeper<B: SessionBackend>(manager: WeakSessionManager<B>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let Some(manager) = manager.upgrade() else {
            break;
        };
        manager.cleanup_expired_sessions();
    }
}

/// Non-owning handle to a [`SessionManager`].
pub struct WeakSessionManager<B: SessionBackend> {
    inner: Weak<Inner<B>>,
}

impl<B: SessionBackend> Clone for WeakSessionManager<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<B: SessionBackend> WeakSessionManager<B> {
    /// Recover the manager if it is still alive.
    pub fn upgrade(&self) -> Option<SessionManager<B>> {
        self.inner.upgrade().map(|inner| SessionManager { inner })
    }
}

/// Information about a session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session ID
    pub session_id: SessionId,

    /// Target platform
    pub platform: Platform,

    /// Time since creation
    pub age: Duration,

    /// Time since last activity
    pub idle: Duration,
}
