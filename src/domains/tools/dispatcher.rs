//! Dispatcher - routes a tool call to its module over a live connection.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use rmcp::model::JsonObject;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::connection::{ConnectionManager, ConnectionStatus};
use super::descriptor::ToolDescriptor;
use super::error::{DispatchError, ModuleError};
use super::profile::{ModuleSet, active_tools};
use super::registry::Registry;

// ============================================================================
// Active modules
// ============================================================================

/// The set of modules enabled for this run.
///
/// Shared between the dispatcher and the built-in `core` module. It only
/// grows: modules can be loaded at runtime but never unloaded. Each growth
/// bumps [`revision`](Self::revision) and wakes every
/// [`subscribe`](Self::subscribe)r.
#[derive(Debug, Clone)]
pub struct ActiveModules {
    modules: Arc<RwLock<ModuleSet>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for ActiveModules {
    fn default() -> Self {
        Self::new(ModuleSet::new())
    }
}

impl ActiveModules {
    pub fn new(modules: ModuleSet) -> Self {
        Self {
            modules: Arc::new(RwLock::new(modules)),
            revision: Arc::new(watch::Sender::new(0)),
        }
    }

    pub fn contains(&self, module: &str) -> bool {
        self.read().contains(module)
    }

    pub fn snapshot(&self) -> ModuleSet {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver that is marked changed on every growth of the set.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Add modules to the active set, returning the ones that were not yet
    /// active in the order given.
    pub fn extend<I, S>(&self, modules: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut active = self
            .modules
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let added: Vec<String> = modules
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| active.insert(name.clone()))
            .collect();
        if !added.is_empty() {
            self.revision.send_modify(|revision| *revision += 1);
        }
        added
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ModuleSet> {
        self.modules
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Resolves, connects and executes tool calls.
pub struct Dispatcher {
    registry: Arc<Registry>,
    active: ActiveModules,
    connections: ConnectionManager,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        active: ActiveModules,
        connections: ConnectionManager,
    ) -> Self {
        info!(
            "Dispatcher ready: {} of {} modules active",
            active.len(),
            registry.all_modules().len()
        );
        Self {
            registry,
            active,
            connections,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn active(&self) -> &ActiveModules {
        &self.active
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// The tool catalog advertised to the agent.
    pub fn catalog(&self) -> Vec<ToolDescriptor> {
        active_tools(&self.registry, &self.active.snapshot())
    }

    pub fn connection_status(&self) -> Vec<ConnectionStatus> {
        self.connections.status()
    }

    fn call_timeout(&self) -> Duration {
        self.connections.target().timeout
    }

    /// Invoke a tool by name.
    ///
    /// The call timeout covers the call itself, not the wait for a
    /// serialized connection. A transport failure drops the module's
    /// connection and is reported as [`DispatchError::BackendUnavailable`];
    /// the call is not retried. The next call to the module reconnects.
    #[instrument(skip(self, arguments), fields(module))]
    pub async fn invoke(&self, tool: &str, arguments: JsonObject) -> Result<Value, DispatchError> {
        let owner = self.registry.lookup_owner(tool)?;
        tracing::Span::current().record("module", owner);

        if !self.active.contains(owner) {
            return Err(DispatchError::ToolNotActive {
                tool: tool.to_string(),
                module: owner.to_string(),
            });
        }

        let module = self.registry.lookup_module(owner)?;

        // A connection dropped while this call queued for it is never used;
        // the call moves to the replacement instead.
        let turn = loop {
            let connection = self.connections.get_connection(module).await?;
            match connection.begin().await {
                Some(turn) => break turn,
                None => debug!("Connection for {} was dropped while queued", owner),
            }
        };
        let connection = turn.connection();

        debug!("Executing {} on {}", tool, owner);
        let outcome = turn
            .execute(module.as_ref(), tool, arguments, self.call_timeout())
            .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(ModuleError::Transport(reason)) => {
                warn!("Transport failure in {} ({}): {}", owner, tool, reason);
                self.connections.release(&connection);
                Err(DispatchError::BackendUnavailable {
                    module: owner.to_string(),
                    tool: tool.to_string(),
                    reason,
                })
            }
            Err(ModuleError::Application(payload)) => {
                debug!("Tool {} rejected by {}: {}", tool, owner, payload);
                connection.record_error(payload.to_string());
                Err(DispatchError::ToolExecution {
                    module: owner.to_string(),
                    tool: tool.to_string(),
                    payload,
                })
            }
            Err(ModuleError::Core(e)) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::module::BackendTarget;
    use crate::domains::tools::profile::{ProfileResolver, Selector};
    use crate::domains::tools::testing::{StubModule, StubState};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn build(modules: Vec<StubModule>, selector: Selector, timeout: Duration) -> Dispatcher {
        let mut builder = Registry::builder();
        for module in modules {
            builder.register(module).unwrap();
        }
        let registry = Arc::new(builder.build());
        let active = ProfileResolver::new(registry.clone(), Vec::new())
            .resolve(&selector)
            .unwrap();
        Dispatcher::new(
            registry,
            ActiveModules::new(active),
            ConnectionManager::new(
                BackendTarget::new("localhost", 50051).with_timeout(timeout),
                true,
            ),
        )
    }

    fn single(name: &str, tools: &[&str]) -> (Dispatcher, Arc<StubState>) {
        let stub = StubModule::new(name, tools);
        let state = stub.state();
        let dispatcher = build(
            vec![stub],
            Selector::modules([name]),
            Duration::from_secs(5),
        );
        (dispatcher, state)
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (dispatcher, _) = single("M", &["ping"]);
        let result = dispatcher.invoke("ping", JsonObject::new()).await.unwrap();
        assert_eq!(result, json!("pong"));
    }

    #[tokio::test]
    async fn test_result_passed_through_unchanged() {
        let (dispatcher, _) = single("classes", &["get_actor"]);
        let mut args = JsonObject::new();
        args.insert("actor".into(), json!("Cube_1"));
        let result = dispatcher.invoke("get_actor", args).await.unwrap();
        assert_eq!(
            result,
            json!({
                "module": "classes",
                "tool": "get_actor",
                "connection": 1,
                "arguments": { "actor": "Cube_1" },
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (dispatcher, state) = single("M", &["ping"]);
        let err = dispatcher
            .invoke("unknown_tool", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::UnknownTool("unknown_tool".into()));
        assert_eq!(state.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_tool_not_active() {
        let active = StubModule::new("core", &["help"]);
        let inactive = StubModule::new("editor", &["play_in_editor"]);
        let inactive_state = inactive.state();
        let dispatcher = build(
            vec![active, inactive],
            Selector::modules(["core"]),
            Duration::from_secs(5),
        );

        let err = dispatcher
            .invoke("play_in_editor", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::ToolNotActive {
                tool: "play_in_editor".into(),
                module: "editor".into()
            }
        );
        assert_eq!(inactive_state.connect_count(), 0);

        let names: Vec<_> = dispatcher
            .catalog()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, vec!["help"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_dispatch_connects_once() {
        let stub = StubModule::new("classes", &["spawn_actor"])
            .with_connect_delay(Duration::from_millis(50));
        let state = stub.state();
        let dispatcher = Arc::new(build(
            vec![stub],
            Selector::All,
            Duration::from_secs(5),
        ));

        let calls: Vec<_> = (0..12)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.invoke("spawn_actor", JsonObject::new()).await
                })
            })
            .collect();
        for call in calls {
            let result = call.await.unwrap().unwrap();
            assert_eq!(result["connection"], 1);
        }
        assert_eq!(state.connect_count(), 1);
        assert_eq!(state.execute_count(), 12);
    }

    #[tokio::test]
    async fn test_transport_failure_invalidates_connection() {
        let (dispatcher, state) = single("editor", &["stop"]);
        dispatcher.invoke("stop", JsonObject::new()).await.unwrap();
        assert_eq!(state.connect_count(), 1);

        state.fail_next_executes(1);
        let err = dispatcher.invoke("stop", JsonObject::new()).await.unwrap_err();
        assert_eq!(err.kind(), "backend_unavailable");
        // No in-call retry.
        assert_eq!(state.connect_count(), 1);
        assert!(dispatcher.connections().cached("editor").is_none());

        let result = dispatcher.invoke("stop", JsonObject::new()).await.unwrap();
        assert_eq!(state.connect_count(), 2);
        assert_eq!(result["connection"], 2);
    }

    #[tokio::test]
    async fn test_application_error_keeps_connection() {
        let (dispatcher, state) = single("classes", &["get_actor"]);
        state.reject_next(1);

        let err = dispatcher
            .invoke("get_actor", JsonObject::new())
            .await
            .unwrap_err();
        match &err {
            DispatchError::ToolExecution { module, tool, payload } => {
                assert_eq!(module, "classes");
                assert_eq!(tool, "get_actor");
                assert_eq!(payload, &json!({ "error": "target not found", "tool": "get_actor" }));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let cached = dispatcher.connections().cached("classes").unwrap();
        assert!(cached.last_error().unwrap().contains("target not found"));

        dispatcher.invoke("get_actor", JsonObject::new()).await.unwrap();
        assert_eq!(state.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_then_fresh_retry() {
        let (dispatcher, state) = single("files", &["read_project_file"]);
        state.fail_next_connects(1);

        let err = dispatcher
            .invoke("read_project_file", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "connection_failed");

        dispatcher
            .invoke("read_project_file", JsonObject::new())
            .await
            .unwrap();
        assert_eq!(state.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_isolated_per_module() {
        let broken = StubModule::new("world_partition", &["query_landscape"]);
        broken.state().fail_next_connects(usize::MAX);
        let healthy = StubModule::new("editor", &["stop"]);
        let dispatcher = build(vec![broken, healthy], Selector::All, Duration::from_secs(5));

        assert!(
            dispatcher
                .invoke("query_landscape", JsonObject::new())
                .await
                .is_err()
        );
        assert!(dispatcher.invoke("stop", JsonObject::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_shared_connection_before_third_connect_fails() {
        let counter = Arc::new(AtomicUsize::new(0));
        let other = StubModule::new("other", &["noop"]).with_global_connects(counter.clone(), 3);
        let stub = StubModule::new("M", &["ping"]).with_global_connects(counter.clone(), 3);
        let state = stub.state();
        let dispatcher = build(vec![other, stub], Selector::All, Duration::from_secs(5));

        dispatcher.invoke("noop", JsonObject::new()).await.unwrap();
        assert_eq!(dispatcher.invoke("ping", JsonObject::new()).await.unwrap(), json!("pong"));
        assert_eq!(dispatcher.invoke("ping", JsonObject::new()).await.unwrap(), json!("pong"));

        // Both pings went through one cached connection.
        assert_eq!(state.connect_count(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // Forcing a reconnect makes the third connect, which fails.
        assert!(dispatcher.connections().invalidate("M"));
        let err = dispatcher.invoke("ping", JsonObject::new()).await.unwrap_err();
        assert_eq!(err.kind(), "connection_failed");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(dispatcher.connections().cached("M").is_none());

        // The next call connects again.
        assert_eq!(dispatcher.invoke("ping", JsonObject::new()).await.unwrap(), json!("pong"));
        assert_eq!(state.connect_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_queued_calls_do_not_time_out_while_waiting() {
        let stub = StubModule::new("editor", &["stop"])
            .with_execute_delay(Duration::from_millis(300));
        let state = stub.state();
        let dispatcher = Arc::new(build(vec![stub], Selector::All, Duration::from_millis(500)));

        let calls: Vec<_> = (0..3)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.invoke("stop", JsonObject::new()).await })
            })
            .collect();

        for call in calls {
            let result = call.await.unwrap().unwrap();
            assert_eq!(result["connection"], 1);
        }
        assert_eq!(state.connect_count(), 1);
        assert_eq!(state.execute_count(), 3);
        assert!(dispatcher.connections().cached("editor").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_call_queued_behind_failure_moves_to_new_connection() {
        let stub = StubModule::new("editor", &["stop"])
            .with_execute_delay(Duration::from_millis(100));
        let state = stub.state();
        state.fail_next_executes(1);
        let dispatcher = Arc::new(build(vec![stub], Selector::All, Duration::from_secs(5)));

        let calls: Vec<_> = (0..2)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.invoke("stop", JsonObject::new()).await })
            })
            .collect();

        let mut results = Vec::new();
        for call in calls {
            results.push(call.await.unwrap());
        }
        let failed: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
        let succeeded: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].kind(), "backend_unavailable");
        assert_eq!(succeeded.len(), 1);
        assert_eq!(succeeded[0]["connection"], 2);
        assert_eq!(state.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_execute_timeout_is_transport_failure() {
        let stub = StubModule::new("tempo_sim", &["tempo_step"])
            .with_execute_delay(Duration::from_secs(5));
        let state = stub.state();
        let dispatcher = build(vec![stub], Selector::All, Duration::from_millis(30));

        let err = dispatcher
            .invoke("tempo_step", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "backend_unavailable");
        assert_eq!(state.connect_count(), 1);
        assert!(dispatcher.connections().cached("tempo_sim").is_none());
    }

    #[test]
    fn test_active_modules_extend() {
        let active = ActiveModules::new(["core".to_string()].into_iter().collect());
        assert_eq!(active.revision(), 0);
        let mut changes = active.subscribe();
        assert!(!changes.has_changed().unwrap());

        let added = active.extend(["editor", "core", "files"]);
        assert_eq!(added, vec!["editor".to_string(), "files".to_string()]);
        assert_eq!(active.revision(), 1);
        assert!(active.contains("files"));
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), 1);

        assert!(active.extend(["editor"]).is_empty());
        assert_eq!(active.revision(), 1);
        assert!(!changes.has_changed().unwrap());
        assert_eq!(active.len(), 3);
    }
}
