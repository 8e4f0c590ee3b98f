//! Backend client - one TCP connection to the engine-side bridge.
//!
//! The wire format is line-delimited JSON. Each request is a single line
//!
//! ```text
//! {"id": 7, "tool": "spawn_actor", "arguments": {...}}
//! ```
//!
//! answered by exactly one line carrying the same id and either a `result`
//! or an `error` member.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rmcp::model::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::domains::tools::{BackendTarget, ConnectError, ModuleError};

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    tool: &'a str,
    arguments: &'a JsonObject,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

struct Stream {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// A connected backend session.
///
/// Requests on one client are strictly one-at-a-time; the stream lock is
/// held from write until the matching reply has been read.
pub struct BackendClient {
    address: String,
    stream: Mutex<Stream>,
    next_id: AtomicU64,
}

impl fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient")
            .field("address", &self.address)
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Open a connection to `target`, bounded by its timeout.
    pub async fn connect(target: &BackendTarget) -> Result<Self, ConnectError> {
        let address = target.address();
        let socket = tokio::time::timeout(target.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| ConnectError::timed_out(target.timeout))?
            .map_err(|e| ConnectError::new(format!("{}: {}", address, e)))?;
        socket.set_nodelay(true)?;

        info!("Connected to backend at {}", address);
        let (read, write) = socket.into_split();
        Ok(Self {
            address,
            stream: Mutex::new(Stream {
                reader: BufReader::new(read),
                writer: write,
            }),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send one request and wait for its reply.
    ///
    /// A backend `error` member is returned verbatim as an application
    /// failure. Anything wrong with the stream itself is a transport failure.
    /// Late replies to earlier, abandoned requests are skipped.
    pub async fn call(&self, tool: &str, arguments: &JsonObject) -> Result<Value, ModuleError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut line = serde_json::to_string(&Request {
            id,
            tool,
            arguments,
        })
        .map_err(|e| ModuleError::transport(format!("failed to encode request: {}", e)))?;
        line.push('\n');

        let mut stream = self.stream.lock().await;
        stream
            .writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ModuleError::transport(format!("write to {} failed: {}", self.address, e)))?;
        stream
            .writer
            .flush()
            .await
            .map_err(|e| ModuleError::transport(format!("write to {} failed: {}", self.address, e)))?;

        let reply = loop {
            let mut response = String::new();
            let read = stream
                .reader
                .read_line(&mut response)
                .await
                .map_err(|e| ModuleError::transport(format!("read from {} failed: {}", self.address, e)))?;
            if read == 0 {
                return Err(ModuleError::transport(format!(
                    "backend at {} closed the connection",
                    self.address
                )));
            }

            let reply: Reply = serde_json::from_str(response.trim_end())
                .map_err(|e| ModuleError::transport(format!("malformed reply: {}", e)))?;
            if reply.id == id {
                break reply;
            }
            if reply.id > id {
                return Err(ModuleError::transport(format!(
                    "reply id {} does not match request id {}",
                    reply.id, id
                )));
            }
            debug!("Skipping late reply to request {}", reply.id);
        };
        drop(stream);
        debug!("Backend replied to request {} ({})", id, tool);

        match (reply.result, reply.error) {
            (_, Some(error)) => Err(ModuleError::Application(error)),
            (Some(result), None) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}
