//! MCP Protocol Layer
//!
//! This module implements the Model Context Protocol server using rmcp 0.9.
//! It exposes the device-automation capabilities as MCP tools and prompts,
//! and the factory that builds one server per session.

pub mod factory;
pub mod prompts;
pub mod server;

pub use factory::{CapabilityFlags, GboxBackend, ServerDescriptor, ServerFactory};
pub use server::DeviceMcpServer;
