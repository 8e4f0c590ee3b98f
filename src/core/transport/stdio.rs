//! STDIO transport implementation.
//!
//! The standard MCP mode: one client, speaking over stdin/stdout. Logs go
//! to stderr so they never interleave with protocol messages.

use rmcp::ServiceExt;
use tracing::info;

use super::{TransportError, TransportResult};
use crate::core::McpServer;

/// STDIO transport handler.
pub struct StdioTransport;

impl StdioTransport {
    /// Serve a single client until stdin closes.
    pub async fn run(server: McpServer) -> TransportResult<()> {
        info!(
            "Ready - communicating via stdin/stdout ({} tools active)",
            server.list_tools().len()
        );

        let session = server.session();
        let service = session
            .clone()
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| TransportError::init(e.to_string()))?;
        let forwarder = session.forward_tool_list_changes(service.peer().clone());

        service
            .waiting()
            .await
            .map_err(|e| TransportError::service(e.to_string()))?;
        forwarder.abort();

        info!("Client closed stdin");
        Ok(())
    }
}
