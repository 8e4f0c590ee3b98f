//! Transports that carry MCP traffic between agents and the server.
//!
//! | Transport | Feature | Wire |
//! |-----------|---------|------|
//! | STDIO | `stdio` (default) | MCP over stdin/stdout, one client |
//! | TCP | `tcp` | MCP over raw sockets, many clients |
//! | HTTP | `http` | JSON-RPC over POST plus `GET /health` |
//!
//! Every transport hands calls to the same [`McpServer`](crate::core::McpServer),
//! so modules loaded by one client are active for all of them.

mod config;
mod error;
mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "tcp")]
pub use config::TcpConfig;

#[cfg(feature = "http")]
pub use config::HttpConfig;
