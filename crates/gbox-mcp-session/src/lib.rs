//! # gbox-mcp-session
//!
//! Session lifecycle management for the Gbox MCP Server.
//!
//! This crate provides:
//! - Session creation, reuse and lookup keyed by session id
//! - Capacity limits per platform
//! - Idle expiry with a periodic background sweep
//! - Idempotent teardown shared by every removal path
//!
//! ## Architecture
//!
//! This is Layer 2 in the architecture - it depends on gbox-mcp-core and is
//! generic over the protocol server, device client and transport, which the
//! binary crate supplies through [`SessionBackend`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod manager;
pub mod session;

// Re-export commonly used types
pub use backend::{SessionBackend, SessionTransport};
pub use manager::{SessionInfo, SessionManager, SessionManagerConfig, WeakSessionManager};
pub use session::Session;
