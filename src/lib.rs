//! AgentBridge MCP Server Library
//!
//! This crate exposes a running engine backend to MCP clients as a set of
//! tools, grouped into service modules that can be enabled per session.
//!
//! # Architecture
//!
//! The server is organized into the following modules:
//!
//! - **core**: Core infrastructure including configuration, error handling, the main server
//!   and the transports
//! - **domains**: Business logic organized by bounded contexts
//!   - **tools**: The module framework: descriptors, registry, profiles, connections,
//!     dispatch and help
//!   - **services**: The shipped service modules and the backend client they share
//!
//! A profile picks the modules active at startup. Clients discover the rest
//! through the `help` tool and enable them with `load_modules`.
//!
//! # Example
//!
//! ```rust,no_run
//! use agentbridge_mcp::{core::McpServer, core::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let server = McpServer::new(config)?;
//!     println!("{} tools active", server.list_tools().len());
//!     // Start the server...
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
