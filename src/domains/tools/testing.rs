//! Instrumented service modules shared by the tool-domain tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::JsonObject;
use serde_json::{Value, json};

use super::descriptor::ToolDescriptor;
use super::error::{ConnectError, ModuleError};
use super::module::{BackendTarget, ServiceModule};

/// Counters and failure switches for a [`StubModule`].
#[derive(Default)]
pub struct StubState {
    connects: AtomicUsize,
    executes: AtomicUsize,
    fail_connects: AtomicUsize,
    fail_executes: AtomicUsize,
    rejects: AtomicUsize,
}

impl StubState {
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn execute_count(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }

    /// Make the next `n` connects fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.fail_connects.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` executes report a transport failure.
    pub fn fail_next_executes(&self, n: usize) {
        self.fail_executes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` executes report an application-level rejection.
    pub fn reject_next(&self, n: usize) {
        self.rejects.store(n, Ordering::SeqCst);
    }
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Connection handed out by a [`StubModule`]; `id` is the connect ordinal.
pub struct StubClient {
    pub id: usize,
}

/// A module whose backend lives in memory.
///
/// `ping` answers `"pong"`; every other tool echoes its call details.
pub struct StubModule {
    name: String,
    tools: Vec<ToolDescriptor>,
    state: Arc<StubState>,
    connect_delay: Duration,
    execute_delay: Duration,
    global_connects: Option<(Arc<AtomicUsize>, usize)>,
}

impl StubModule {
    pub fn new(name: &str, tools: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            tools: tools
                .iter()
                .map(|t| ToolDescriptor::without_arguments(*t, format!("{t} tool")))
                .collect(),
            state: Arc::new(StubState::default()),
            connect_delay: Duration::ZERO,
            execute_delay: Duration::ZERO,
            global_connects: None,
        }
    }

    pub fn state(&self) -> Arc<StubState> {
        self.state.clone()
    }

    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = delay;
        self
    }

    /// Count connects in a counter shared with other modules, failing the
    /// connect that brings it to `fail_on`.
    pub fn with_global_connects(mut self, counter: Arc<AtomicUsize>, fail_on: usize) -> Self {
        self.global_connects = Some((counter, fail_on));
        self
    }
}

#[async_trait]
impl ServiceModule for StubModule {
    type Client = StubClient;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "In-memory test module"
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn connect(&self, _target: &BackendTarget) -> Result<StubClient, ConnectError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let id = self.state.connects.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((counter, fail_on)) = &self.global_connects {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == *fail_on {
                return Err(ConnectError::new("backend refused connection"));
            }
        }
        if take_one(&self.state.fail_connects) {
            return Err(ConnectError::new("connection refused"));
        }
        Ok(StubClient { id })
    }

    async fn execute(
        &self,
        client: &StubClient,
        tool: &str,
        arguments: JsonObject,
    ) -> Result<Value, ModuleError> {
        self.state.executes.fetch_add(1, Ordering::SeqCst);
        if !self.execute_delay.is_zero() {
            tokio::time::sleep(self.execute_delay).await;
        }
        if take_one(&self.state.fail_executes) {
            return Err(ModuleError::transport("connection reset by peer"));
        }
        if take_one(&self.state.rejects) {
            return Err(ModuleError::Application(
                json!({ "error": "target not found", "tool": tool }),
            ));
        }
        if tool == "ping" {
            return Ok(json!("pong"));
        }
        Ok(json!({
            "module": self.name,
            "tool": tool,
            "connection": client.id,
            "arguments": arguments,
        }))
    }
}
