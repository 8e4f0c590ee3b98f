//! TCP transport implementation.
//!
//! Raw TCP sockets carrying MCP JSON-RPC. Every accepted client is served by
//! a session of the same server, so `load_modules` from one client enables
//! the tools for all of them, and each of them is sent `list_changed`.

use rmcp::ServiceExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::{TransportError, TransportResult, config::TcpConfig};
use crate::core::McpServer;

/// TCP transport handler.
pub struct TcpTransport {
    config: TcpConfig,
    clients: Arc<AtomicUsize>,
}

impl TcpTransport {
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            clients: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Accept clients until the listener fails to bind. Accept errors are
    /// logged and retried.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        info!("Ready - listening on {} (MCP over TCP)", addr);

        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY for {}: {}", peer_addr, e);
                    }

                    let connected = self.clients.fetch_add(1, Ordering::SeqCst) + 1;
                    info!("Accepted {} ({} client(s) connected)", peer_addr, connected);

                    let server = server.clone();
                    let clients = self.clients.clone();
                    tokio::spawn(async move {
                        serve_client(server, stream, peer_addr).await;
                        let remaining = clients.fetch_sub(1, Ordering::SeqCst) - 1;
                        debug!("{} client(s) still connected", remaining);
                    });
                }
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn serve_client(server: McpServer, stream: TcpStream, peer_addr: SocketAddr) {
    let session = server.session();
    let service = match session.clone().serve(stream).await {
        Ok(s) => s,
        Err(e) => {
            warn!("MCP handshake with {} failed: {}", peer_addr, e);
            return;
        }
    };
    let forwarder = session.forward_tool_list_changes(service.peer().clone());

    match service.waiting().await {
        Ok(reason) => info!("Client {} disconnected ({:?})", peer_addr, reason),
        Err(e) => warn!("Error while serving client {}: {:?}", peer_addr, e),
    }
    forwarder.abort();
}
