//! Connection Manager - lazy, per-module backend connections.
//!
//! Each module gets one slot. The first caller that finds the slot empty
//! starts a connect and parks the in-flight future in the slot; every other
//! caller for that module awaits the same future, so a module is connected at
//! most once at a time. Failed connects leave the slot empty again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use rmcp::model::JsonObject;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

use super::error::{ConnectError, DispatchError, ModuleError};
use super::module::{AnyServiceModule, BackendTarget, ConnectionHandle, SharedModule};

// ============================================================================
// Connection
// ============================================================================

/// A live backend connection for one module (a cache entry).
///
/// Entries are replaced on reconnect, never repaired in place.
pub struct Connection {
    module: String,
    handle: ConnectionHandle,
    established_at: DateTime<Utc>,
    generation: u64,
    gate: Option<Arc<tokio::sync::Mutex<()>>>,
    retired: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl Connection {
    fn new(module: String, handle: ConnectionHandle, generation: u64, serialize: bool) -> Self {
        Self {
            module,
            handle,
            established_at: Utc::now(),
            generation,
            gate: serialize.then(|| Arc::new(tokio::sync::Mutex::new(()))),
            retired: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait for this connection's turn to run a call.
    ///
    /// With call serialization enabled this waits until no other call is
    /// running on the connection. Returns `None` if the connection was
    /// dropped from the cache in the meantime; the caller should fetch a
    /// fresh one.
    pub async fn begin(self: Arc<Self>) -> Option<Turn> {
        let permit = match &self.gate {
            Some(gate) => Some(gate.clone().lock_owned().await),
            None => None,
        };
        if self.is_retired() {
            return None;
        }
        Some(Turn {
            connection: self,
            _permit: permit,
        })
    }

    /// Whether the connection manager has dropped this connection.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    /// Remember the most recent application-level error seen on this connection.
    pub fn record_error(&self, error: impl Into<String>) {
        *lock(&self.last_error) = Some(error.into());
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            module: self.module.clone(),
            established_at: self.established_at,
            last_error: self.last_error(),
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("module", &self.module)
            .field("established_at", &self.established_at)
            .field("generation", &self.generation)
            .field("serialized", &self.gate.is_some())
            .finish()
    }
}

/// Exclusive use of a [`Connection`] for one call.
///
/// Holding a turn means the call is next on the wire, so the call timeout
/// starts here and never covers time spent queueing behind other calls.
pub struct Turn {
    connection: Arc<Connection>,
    _permit: Option<OwnedMutexGuard<()>>,
}

impl Turn {
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Run `tool`, bounded by `timeout`. Running out of time is a transport
    /// failure.
    pub async fn execute(
        &self,
        module: &dyn AnyServiceModule,
        tool: &str,
        arguments: JsonObject,
        timeout: Duration,
    ) -> Result<Value, ModuleError> {
        let call = module.execute_any(&self.connection.handle, tool, arguments);
        match tokio::time::timeout(timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ModuleError::transport(format!(
                "call timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

/// Diagnostic snapshot of a cached connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub module: String,
    pub established_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// ============================================================================
// Connection Manager
// ============================================================================

type ConnectOutcome = Result<Arc<Connection>, ConnectError>;
type PendingConnect = Shared<BoxFuture<'static, ConnectOutcome>>;

enum Slot {
    Connecting { generation: u64, pending: PendingConnect },
    Ready(Arc<Connection>),
}

/// Per-module lazy connection cache.
pub struct ConnectionManager {
    target: BackendTarget,
    serialize_calls: bool,
    slots: Mutex<HashMap<String, Slot>>,
    generations: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionManager {
    pub fn new(target: BackendTarget, serialize_calls: bool) -> Self {
        Self {
            target,
            serialize_calls,
            slots: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> &BackendTarget {
        &self.target
    }

    /// Return the module's cached connection, connecting first if needed.
    ///
    /// Concurrent callers for the same module share a single connect attempt
    /// and all observe its outcome.
    pub async fn get_connection(
        &self,
        module: &SharedModule,
    ) -> Result<Arc<Connection>, DispatchError> {
        let name = module.name().to_string();

        let (generation, pending) = {
            let mut slots = lock(&self.slots);
            match slots.get(&name) {
                Some(Slot::Ready(connection)) => return Ok(connection.clone()),
                Some(Slot::Connecting {
                    generation,
                    pending,
                }) => (*generation, pending.clone()),
                None => {
                    let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = self.start_connect(module.clone(), generation);
                    slots.insert(
                        name.clone(),
                        Slot::Connecting {
                            generation,
                            pending: pending.clone(),
                        },
                    );
                    (generation, pending)
                }
            }
        };

        let outcome = pending.await;
        self.settle(&name, generation, &outcome);

        outcome.map_err(|e| DispatchError::ConnectionFailed {
            module: name,
            reason: e.to_string(),
        })
    }

    fn start_connect(&self, module: SharedModule, generation: u64) -> PendingConnect {
        let target = self.target.clone();
        let serialize = self.serialize_calls;

        async move {
            let name = module.name().to_string();
            let outcome = match tokio::time::timeout(target.timeout, module.connect_any(&target))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ConnectError::timed_out(target.timeout)),
            };
            match outcome {
                Ok(handle) => {
                    info!("Connected to {} at {}", name, target.address());
                    Ok(Arc::new(Connection::new(name, handle, generation, serialize)))
                }
                Err(e) => {
                    warn!("Failed to connect to {} at {}: {}", name, target.address(), e);
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Move a finished connect out of the `Connecting` state. Only the first
    /// waiter to get here changes anything.
    fn settle(&self, name: &str, generation: u64, outcome: &ConnectOutcome) {
        let mut slots = lock(&self.slots);
        let in_flight = matches!(
            slots.get(name),
            Some(Slot::Connecting { generation: g, .. }) if *g == generation
        );
        if !in_flight {
            return;
        }
        match outcome {
            Ok(connection) => {
                slots.insert(name.to_string(), Slot::Ready(connection.clone()));
            }
            Err(_) => {
                slots.remove(name);
            }
        }
    }

    /// Drop the module's cached connection so the next call reconnects.
    ///
    /// A connect that is still in flight is left alone.
    pub fn invalidate(&self, module: &str) -> bool {
        let mut slots = lock(&self.slots);
        if let Some(Slot::Ready(connection)) = slots.get(module) {
            connection.retire();
            slots.remove(module);
            info!("Invalidated connection for {}", module);
            true
        } else {
            false
        }
    }

    /// Drop `connection` if it is still the cached one for its module.
    ///
    /// Used after a failed call so a late failure report cannot evict a newer
    /// connection.
    pub fn release(&self, connection: &Connection) -> bool {
        let mut slots = lock(&self.slots);
        let current = matches!(
            slots.get(connection.module()),
            Some(Slot::Ready(cached)) if cached.generation() == connection.generation()
        );
        if current {
            connection.retire();
            slots.remove(connection.module());
            info!(
                "Dropped connection for {} (generation {})",
                connection.module(),
                connection.generation()
            );
        }
        current
    }

    /// Drop every established connection. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        let mut slots = lock(&self.slots);
        let before = slots.len();
        slots.retain(|_, slot| match slot {
            Slot::Ready(connection) => {
                connection.retire();
                false
            }
            Slot::Connecting { .. } => true,
        });
        let closed = before - slots.len();
        if closed > 0 {
            info!("Closed {} backend connection(s)", closed);
        }
        closed
    }

    /// Cached connection for a module, if one is established.
    pub fn cached(&self, module: &str) -> Option<Arc<Connection>> {
        match lock(&self.slots).get(module) {
            Some(Slot::Ready(connection)) => Some(connection.clone()),
            _ => None,
        }
    }

    /// Snapshot of every established connection, sorted by module name.
    pub fn status(&self) -> Vec<ConnectionStatus> {
        let mut status: Vec<_> = lock(&self.slots)
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(connection) => Some(connection.status()),
                Slot::Connecting { .. } => None,
            })
            .collect();
        status.sort_by(|a, b| a.module.cmp(&b.module));
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::testing::{StubClient, StubModule};
    use std::time::Duration;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(BackendTarget::new("localhost", 50051), true)
    }

    fn client_id(connection: &Connection) -> usize {
        connection
            .handle()
            .downcast_ref::<StubClient>()
            .map(|c| c.id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_connects_once_and_caches() {
        let stub = StubModule::new("editor", &["stop"]);
        let state = stub.state();
        let module: SharedModule = Arc::new(stub);
        let manager = manager();

        let first = manager.get_connection(&module).await.unwrap();
        let second = manager.get_connection(&module).await.unwrap();

        assert_eq!(state.connect_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.status().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_connects_once() {
        let stub = StubModule::new("classes", &["spawn_actor"])
            .with_connect_delay(Duration::from_millis(50));
        let state = stub.state();
        let module: SharedModule = Arc::new(stub);
        let manager = Arc::new(manager());

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                let module = module.clone();
                tokio::spawn(async move { manager.get_connection(&module).await })
            })
            .collect();

        for task in tasks {
            let connection = task.await.unwrap().unwrap();
            assert_eq!(client_id(&connection), 1);
        }
        assert_eq!(state.connect_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_connect_reported_to_all_waiters() {
        let stub = StubModule::new("classes", &["spawn_actor"])
            .with_connect_delay(Duration::from_millis(50));
        let state = stub.state();
        state.fail_next_connects(1);
        let module: SharedModule = Arc::new(stub);
        let manager = Arc::new(manager());

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let module = module.clone();
                tokio::spawn(async move { manager.get_connection(&module).await })
            })
            .collect();

        for task in tasks {
            let err = task.await.unwrap().unwrap_err();
            assert_eq!(err.kind(), "connection_failed");
        }
        assert_eq!(state.connect_count(), 1);
        assert!(manager.cached("classes").is_none());

        // No stale entry: the next caller connects fresh.
        let connection = manager.get_connection(&module).await.unwrap();
        assert_eq!(client_id(&connection), 2);
        assert_eq!(state.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reconnect() {
        let stub = StubModule::new("files", &["read_project_file"]);
        let state = stub.state();
        let module: SharedModule = Arc::new(stub);
        let manager = manager();

        manager.get_connection(&module).await.unwrap();
        assert!(manager.invalidate("files"));
        assert!(!manager.invalidate("files"));

        let connection = manager.get_connection(&module).await.unwrap();
        assert_eq!(client_id(&connection), 2);
        assert_eq!(state.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_waiting_turn_refused_once_connection_dropped() {
        let module: SharedModule = Arc::new(StubModule::new("editor", &["stop"]));
        let manager = manager();

        let connection = manager.get_connection(&module).await.unwrap();
        let first = connection.clone().begin().await.unwrap();

        let waiter = tokio::spawn(connection.clone().begin());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        assert!(manager.release(first.connection()));
        drop(first);

        assert!(waiter.await.unwrap().is_none());
        assert!(connection.is_retired());
    }

    #[tokio::test]
    async fn test_close_all_drops_ready_connections() {
        let files: SharedModule = Arc::new(StubModule::new("files", &["read_project_file"]));
        let editor: SharedModule = Arc::new(StubModule::new("editor", &["quit"]));
        let manager = manager();

        manager.get_connection(&files).await.unwrap();
        manager.get_connection(&editor).await.unwrap();
        assert_eq!(manager.status().len(), 2);

        let files_connection = manager.cached("files").unwrap();
        assert_eq!(manager.close_all(), 2);
        assert!(files_connection.is_retired());
        assert!(manager.status().is_empty());
        assert!(manager.cached("files").is_none());
        assert_eq!(manager.close_all(), 0);
    }

    #[tokio::test]
    async fn test_release_ignores_stale_connection() {
        let stub = StubModule::new("files", &["read_project_file"]);
        let module: SharedModule = Arc::new(stub);
        let manager = manager();

        let old = manager.get_connection(&module).await.unwrap();
        assert!(manager.release(&old));
        let new = manager.get_connection(&module).await.unwrap();

        // A late failure report for the old connection must not evict the new one.
        assert!(!manager.release(&old));
        assert!(Arc::ptr_eq(&manager.cached("files").unwrap(), &new));
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let stub = StubModule::new("slow", &["wait"]).with_connect_delay(Duration::from_secs(5));
        let module: SharedModule = Arc::new(stub);
        let manager = ConnectionManager::new(
            BackendTarget::new("localhost", 50051).with_timeout(Duration::from_millis(20)),
            true,
        );

        let err = manager.get_connection(&module).await.unwrap_err();
        match err {
            DispatchError::ConnectionFailed { module, reason } => {
                assert_eq!(module, "slow");
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(manager.cached("slow").is_none());
    }

    #[tokio::test]
    async fn test_modules_are_isolated() {
        let broken = StubModule::new("broken", &["a"]);
        broken.state().fail_next_connects(usize::MAX);
        let healthy = StubModule::new("healthy", &["b"]);
        let broken: SharedModule = Arc::new(broken);
        let healthy: SharedModule = Arc::new(healthy);
        let manager = manager();

        assert!(manager.get_connection(&broken).await.is_err());
        assert!(manager.get_connection(&healthy).await.is_ok());
        assert!(manager.get_connection(&broken).await.is_err());
        assert_eq!(manager.status().len(), 1);
    }

    #[test]
    fn test_record_error_on_connection() {
        let connection = Connection::new("editor".into(), Arc::new(()), 1, false);
        assert!(connection.last_error().is_none());
        connection.record_error("level not found");
        let status = connection.status();
        assert_eq!(status.last_error.as_deref(), Some("level not found"));
        assert_eq!(status.module, "editor");
    }
}
