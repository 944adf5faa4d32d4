//! Property-based tests for session bookkeeping.
//!
//! Uses proptest to drive random create/get/destroy sequences against a
//! session manager and check them against a simple set model.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use gbox_mcp_core::{Error, McpLogger, Platform, Result, SessionId};
use gbox_mcp_session::{SessionBackend, SessionManager, SessionManagerConfig, SessionTransport};

#[derive(Default)]
struct CountingTransport {
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl SessionTransport for CountingTransport {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct CountingBackend {
    servers_built: Arc<AtomicUsize>,
}

impl SessionBackend for CountingBackend {
    type Server = ();
    type Client = ();
    type ClientOptions = ();
    type Transport = CountingTransport;

    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn create_client(&self, _options: Option<()>) -> Result<()> {
        Ok(())
    }

    fn create_server(&self, _id: &SessionId, _client: Arc<()>, _logger: McpLogger) {
        self.servers_built.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create(u8),
    Get(u8),
    Destroy(u8),
}

/// Generate an operation over a small id pool so ids collide often.
fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8).prop_map(Op::Create),
        (0u8..8).prop_map(Op::Get),
        (0u8..8).prop_map(Op::Destroy),
    ]
}

fn session_id(n: u8) -> SessionId {
    SessionId::from(format!("session-{n}"))
}

proptest! {
    /// The live set always matches the model and never exceeds capacity.
    #[test]
    fn session_count_tracks_model(
        max_sessions in 1usize..6,
        ops in prop::collection::vec(op(), 1..64),
    ) {
        let servers_built = Arc::new(AtomicUsize::new(0));
        let manager = SessionManager::with_config(
            CountingBackend { servers_built: Arc::clone(&servers_built) },
            SessionManagerConfig { max_sessions, ..Default::default() },
        );
        let mut live: HashSet<u8> = HashSet::new();
        let mut created = 0usize;

        for op in ops {
            match op {
                Op::Create(n) => {
                    let result = manager.create_session(
                        session_id(n),
                        Arc::new(CountingTransport::default()),
                        None,
                    );
                    if live.contains(&n) {
                        prop_assert!(result.is_ok());
                    } else if live.len() >= max_sessions {
                        prop_assert!(matches!(result, Err(Error::SessionLimitReached(m)) if m == max_sessions));
                    } else {
                        prop_assert!(result.is_ok());
                        live.insert(n);
                        created += 1;
                    }
                }
                Op::Get(n) => {
                    prop_assert_eq!(manager.get_session(&session_id(n)).is_some(), live.contains(&n));
                }
                Op::Destroy(n) => {
                    prop_assert_eq!(manager.destroy_session(&session_id(n)), live.remove(&n));
                }
            }

            prop_assert!(manager.session_count() <= max_sessions);
            prop_assert_eq!(manager.session_count(), live.len());
        }

        prop_assert_eq!(servers_built.load(Ordering::SeqCst), created);
    }

    /// Destroying any number of times closes the transport exactly once.
    #[test]
    fn destroy_closes_transport_once(repeats in 1usize..10) {
        let manager = SessionManager::new(CountingBackend {
            servers_built: Arc::new(AtomicUsize::new(0)),
        });
        let transport = Arc::new(CountingTransport::default());
        let id = session_id(0);

        manager.create_session(id.clone(), Arc::clone(&transport), None).unwrap();
        for _ in 0..repeats {
            manager.destroy_session(&id);
        }

        prop_assert_eq!(transport.close_calls.load(Ordering::SeqCst), 1);
        prop_assert_eq!(manager.session_count(), 0);
    }
}
