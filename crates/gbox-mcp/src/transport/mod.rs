//! Transports: Streamable HTTP with per-session routing, and stdio.

pub mod http;
pub mod message;
pub mod router;
pub mod stdio;

pub use http::StreamableHttpTransport;
pub use router::{build_router, Managers, RouterError};
