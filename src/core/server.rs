//! MCP Server implementation and lifecycle management.
//!
//! This module contains the main server handler that implements the MCP
//! protocol by delegating every tool call to the [`Dispatcher`].
//!
//! ## Tool Architecture
//!
//! Tools are not known to this file. They come from the service modules
//! registered in `domains/services/mod.rs`; the advertised list is whatever
//! the active modules provide, and it grows when `load_modules` is called.

use rmcp::{
    ErrorData as McpError, Peer, RoleServer, ServerHandler,
    model::*,
    service::RequestContext,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::config::Config;
use super::error::Result;
use crate::domains::services::{CoreBinding, default_profiles, register_all};
use crate::domains::tools::{
    ActiveModules, ConnectionManager, ConnectionStatus, DispatchError, Dispatcher,
    ProfileResolver,
};

const INSTRUCTIONS: &str = "Tools for controlling a running engine instance. Call help first for \
an overview of the loaded modules; call load_modules to enable more tools.";

/// The main MCP server handler.
///
/// Cheap to clone: every clone shares the same dispatcher, so TCP and HTTP
/// clients see one active module set and one pool of backend connections.
/// Use [`McpServer::session`] for each connected client so tool list
/// changes are announced to every client, not only the first to notice.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    /// Routes tool calls to service modules.
    dispatcher: Arc<Dispatcher>,

    /// Active-set revision this session's client was last told about.
    announced_revision: Arc<AtomicU64>,
}

impl McpServer {
    /// Create a new MCP server with the given configuration.
    ///
    /// Registers every module, resolves the configured profile and binds the
    /// built-in `core` module. Fails on duplicate names or an unknown
    /// profile or module.
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let binding = CoreBinding::new();
        let registry = Arc::new(register_all(binding.clone())?);
        let resolver = ProfileResolver::new(registry.clone(), default_profiles());

        let selector = config.profile.selector();
        let modules = resolver.resolve(&selector)?;
        let active = ActiveModules::new(modules);
        binding.bind(&registry, active.clone());

        info!(
            "Selected {}: {} modules, {} tools",
            selector,
            active.len(),
            resolver.active_tools(&active.snapshot()).len()
        );

        let connections = ConnectionManager::new(
            config.backend.target(),
            config.dispatch.serialize_calls,
        );
        let dispatcher = Arc::new(Dispatcher::new(registry, active, connections));

        Ok(Self {
            config,
            dispatcher,
            announced_revision: Arc::new(AtomicU64::new(0)),
        })
    }

    /// A handle for one connected client.
    ///
    /// Shares the dispatcher but tracks its own announced revision, starting
    /// from the current one since the client lists tools on connect.
    pub fn session(&self) -> Self {
        let current = self.dispatcher.active().revision();
        Self {
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            announced_revision: Arc::new(AtomicU64::new(current)),
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    /// Usage hint sent to clients on initialize.
    pub fn instructions(&self) -> &'static str {
        INSTRUCTIONS
    }

    /// Get the server configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Live backend connections (for the health endpoint).
    pub fn connection_status(&self) -> Vec<ConnectionStatus> {
        self.dispatcher.connection_status()
    }

    /// Close every backend connection. The next call reconnects.
    pub fn shutdown(&self) {
        let closed = self.dispatcher.connections().close_all();
        info!("Released {} backend connection(s)", closed);
    }

    /// Currently advertised tools as rmcp models.
    pub fn tools(&self) -> Vec<Tool> {
        self.dispatcher
            .catalog()
            .iter()
            .map(|tool| tool.to_tool())
            .collect()
    }

    /// Tools to send in a `tools/list` reply. The client now knows the
    /// current set, so no change is pending for this session.
    pub fn advertised_tools(&self) -> Vec<Tool> {
        let revision = self.dispatcher.active().revision();
        let tools = self.tools();
        self.announced_revision.store(revision, Ordering::SeqCst);
        tools
    }

    // ========================================================================
    // HTTP Transport Support Methods
    // ========================================================================

    /// List all available tools (for HTTP transport).
    pub fn list_tools(&self) -> Vec<Value> {
        self.dispatcher
            .catalog()
            .iter()
            .map(|tool| tool.to_json())
            .collect()
    }

    /// Call a tool by name.
    ///
    /// Never fails: dispatch errors become results with `is_error` set.
    pub async fn call_tool(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let outcome = self
            .dispatcher
            .invoke(name, arguments.unwrap_or_default())
            .await;
        call_result(outcome)
    }

    /// Whether `load_modules` changed the tool list since the last check.
    /// Marks the change as announced.
    pub fn take_tool_list_change(&self) -> bool {
        let current = self.dispatcher.active().revision();
        self.announced_revision.swap(current, Ordering::SeqCst) != current
    }

    /// Wait until the tool list changed and this session has not announced
    /// it yet. Returns `false` once no more changes can happen.
    pub async fn next_tool_list_change(&self, changes: &mut watch::Receiver<u64>) -> bool {
        loop {
            if self.take_tool_list_change() {
                return true;
            }
            if changes.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Push `notifications/tools/list_changed` to `peer` whenever any client
    /// loads modules. The task ends when the peer goes away.
    pub fn forward_tool_list_changes(&self, peer: Peer<RoleServer>) -> JoinHandle<()> {
        let session = self.clone();
        let mut changes = self.dispatcher.active().subscribe();
        tokio::spawn(async move {
            while session.next_tool_list_change(&mut changes).await {
                debug!("Active modules changed, notifying client");
                if let Err(e) = peer.notify_tool_list_changed().await {
                    debug!("Stopped forwarding tool list changes: {}", e);
                    break;
                }
            }
        })
    }
}

/// Convert a dispatch outcome into an MCP tool result.
///
/// String results are sent as-is; anything else is pretty-printed JSON,
/// with objects also attached as structured content.
pub fn call_result(outcome: std::result::Result<Value, DispatchError>) -> CallToolResult {
    match outcome {
        Ok(value) => {
            let text = match &value {
                Value::String(s) => s.clone(),
                other => pretty(other),
            };
            let mut result = CallToolResult::success(vec![Content::text(text)]);
            if value.is_object() {
                result.structured_content = Some(value);
            }
            result
        }
        Err(err) => {
            debug!("Tool call failed ({}): {}", err.kind(), err);
            let body = err.to_json();
            let mut result = CallToolResult::error(vec![Content::text(pretty(&body))]);
            result.structured_content = Some(body);
            result
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(self.instructions().to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_tool_list_changed()
                .build(),
            ..Default::default()
        }
    }

    #[instrument(skip(self, _context))]
    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        let tools = self.advertised_tools();
        info!("Listing {} tools", tools.len());
        Ok(ListToolsResult {
            tools,
            next_cursor: None,
            meta: None,
        })
    }

    #[instrument(skip(self, request, context), fields(tool = %request.name))]
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        info!("Calling tool: {}", request.name);
        let result = McpServer::call_tool(self, &request.name, request.arguments).await;

        if self.take_tool_list_change() {
            info!("Active modules changed, notifying client");
            if let Err(e) = context.peer.notify_tool_list_changed().await {
                warn!("Failed to send tool list change notification: {}", e);
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server(modules: Option<&[&str]>) -> McpServer {
        let mut config = Config::default();
        config.backend.port = 1;
        config.profile.modules = modules.map(|m| m.iter().map(|s| s.to_string()).collect());
        McpServer::new(config).unwrap()
    }

    fn args(value: Value) -> Option<JsonObject> {
        value.as_object().cloned()
    }

    fn text(result: &CallToolResult) -> String {
        result.content[0]
            .as_text()
            .map(|t| t.text.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_default_profile_lists_every_tool() {
        let server = server(None);
        assert_eq!(server.list_tools().len(), 98);
        assert_eq!(server.list_tools()[0]["name"], "help");
    }

    #[test]
    fn test_unknown_profile_fails_startup() {
        let mut config = Config::default();
        config.profile.profile = "nonexistent".into();
        let err = McpServer::new(config).err().unwrap();
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn test_unknown_module_fails_startup() {
        let mut config = Config::default();
        config.profile.modules = Some(vec!["ghost".into()]);
        assert!(McpServer::new(config).is_err());
    }

    #[tokio::test]
    async fn test_help_through_server() {
        let server = server(Some(&["editor"]));
        let result = server.call_tool("help", None).await;

        assert_eq!(result.is_error, Some(false));
        let body = result.structured_content.unwrap();
        assert_eq!(body["topic"], "overview");
        assert!(body["help"].as_str().unwrap().contains("core"));
    }

    #[tokio::test]
    async fn test_inactive_tool_is_error_result() {
        let server = server(Some(&["editor"]));
        let result = server.call_tool("spawn_actor", None).await;

        assert_eq!(result.is_error, Some(true));
        let body: Value = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(body["error"]["kind"], "tool_not_active");
        assert_eq!(body["error"]["module"], "classes");
    }

    #[tokio::test]
    async fn test_load_modules_announces_change_once() {
        let server = server(Some(&[]));
        assert_eq!(server.list_tools().len(), 2);
        assert!(!server.take_tool_list_change());

        let result = server
            .call_tool("load_modules", args(json!({ "modules": ["files"] })))
            .await;
        assert_eq!(result.is_error, Some(false));
        assert_eq!(server.list_tools().len(), 6);

        assert!(server.take_tool_list_change());
        assert!(!server.take_tool_list_change());
    }

    #[tokio::test]
    async fn test_every_session_hears_of_module_load() {
        let server = server(Some(&[]));
        let first = server.session();
        let second = server.session();
        let idle = server.session();

        let result = first
            .call_tool("load_modules", args(json!({ "modules": ["files"] })))
            .await;
        assert_eq!(result.is_error, Some(false));

        assert!(first.take_tool_list_change());
        assert!(!first.take_tool_list_change());
        assert!(second.take_tool_list_change());
        assert!(!second.take_tool_list_change());

        assert_eq!(idle.advertised_tools().len(), 6);
        assert!(!idle.take_tool_list_change());

        let late = server.session();
        assert!(!late.take_tool_list_change());
    }

    #[tokio::test]
    async fn test_idle_session_woken_by_other_session_load() {
        let server = server(Some(&[]));
        let caller = server.session();
        let idle = server.session();
        let mut changes = server.dispatcher().active().subscribe();

        let waiter = tokio::spawn(async move { idle.next_tool_list_change(&mut changes).await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        caller
            .call_tool("load_modules", args(json!({ "modules": ["editor"] })))
            .await;

        let woken = tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("idle session was not woken")
            .unwrap();
        assert!(woken);
        assert!(caller.take_tool_list_change());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_connection_failed() {
        let server = server(Some(&["files"]));
        let result = server
            .call_tool(
                "read_project_file",
                args(json!({ "relative_path": "Config/DefaultEngine.ini" })),
            )
            .await;

        assert_eq!(result.is_error, Some(true));
        let body = result.structured_content.unwrap();
        assert_eq!(body["error"]["kind"], "connection_failed");
        assert_eq!(body["error"]["module"], "files");
    }

    #[test]
    fn test_string_results_are_plain_text() {
        let result = call_result(Ok(json!("pong")));
        assert_eq!(text(&result), "pong");
        assert!(result.structured_content.is_none());

        let result = call_result(Ok(json!({ "actors": [] })));
        assert!(text(&result).contains("\"actors\""));
        assert_eq!(result.structured_content, Some(json!({ "actors": [] })));
    }
}
