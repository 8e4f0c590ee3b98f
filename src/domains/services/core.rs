//! Built-in `core` module.
//!
//! Always active. Its tools operate on the server itself rather than on a
//! backend: `help` renders documentation from the registry and
//! `load_modules` grows the active module set at runtime.
//!
//! The module is registered before the registry exists, so it reaches the
//! registry through a [`CoreBinding`] that is filled in once startup is done.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::domains::tools::{
    ActiveModules, BackendTarget, ConnectError, DispatchError, HelpAssembler, ModuleError,
    OVERVIEW_TOPIC, Registry, ServiceModule, ToolDescriptor, active_tools,
};

// ============================================================================
// Tool Parameters
// ============================================================================

/// Parameters for the help tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct HelpParams {
    /// Topic to explain: a module name, an extra topic, or empty for the
    /// overview.
    #[serde(default)]
    pub topic: Option<String>,
}

/// Parameters for the load_modules tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadModulesParams {
    /// Names of the modules to activate.
    pub modules: Vec<String>,
}

/// Result of a load_modules call.
#[derive(Debug, Serialize, JsonSchema)]
struct LoadModulesResult {
    /// Modules that were not active before this call.
    loaded_modules: Vec<String>,
    /// Tools that became callable.
    new_tools: Vec<String>,
    /// Active module count after the call.
    total_modules: usize,
    /// Active tool count after the call.
    total_tools: usize,
}

// ============================================================================
// Binding
// ============================================================================

struct CoreContext {
    registry: Weak<Registry>,
    active: ActiveModules,
}

/// Late link from the `core` module to the registry that contains it.
#[derive(Clone, Default)]
pub struct CoreBinding(Arc<OnceLock<CoreContext>>);

impl CoreBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to the finished registry. Returns `false` if already bound.
    pub fn bind(&self, registry: &Arc<Registry>, active: ActiveModules) -> bool {
        self.0
            .set(CoreContext {
                registry: Arc::downgrade(registry),
                active,
            })
            .is_ok()
    }

    pub fn is_bound(&self) -> bool {
        self.0.get().is_some()
    }
}

/// The `core` module's "connection": the running server's registry and
/// active set.
pub struct CoreSession {
    registry: Arc<Registry>,
    active: ActiveModules,
}

// ============================================================================
// Module
// ============================================================================

/// Built-in module providing `help` and `load_modules`.
pub struct CoreModule {
    tools: Vec<ToolDescriptor>,
    binding: CoreBinding,
}

impl CoreModule {
    pub const NAME: &'static str = "core";

    pub const DESCRIPTION: &'static str = "Essential operations: help and runtime module loading";

    pub const HELP: &'static str = "help";

    pub const LOAD_MODULES: &'static str = "load_modules";

    pub fn new(binding: CoreBinding) -> Self {
        let tools = vec![
            ToolDescriptor::for_params::<HelpParams>(
                Self::HELP,
                "Get help on the available tools. Call this first if you are unsure how to \
                 proceed. Leave topic empty for an overview, or pass a module name.",
            ),
            ToolDescriptor::for_params::<LoadModulesParams>(
                Self::LOAD_MODULES,
                "Load additional tool modules into this session. Call help to see which \
                 modules are available.",
            ),
        ];
        Self { tools, binding }
    }

    fn help(session: &CoreSession, arguments: JsonObject) -> Result<Value, ModuleError> {
        let params: HelpParams = parse(Self::HELP, arguments)?;
        let topic = params.topic.unwrap_or_default();
        let assembler = HelpAssembler::new(&session.registry, &session.active);
        let text = assembler.render(&topic)?;

        let topic = match topic.trim() {
            "" => OVERVIEW_TOPIC.to_string(),
            t => t.to_lowercase(),
        };
        let mut result = json!({ "topic": topic, "help": text });
        if topic == OVERVIEW_TOPIC {
            result["available_topics"] = json!(assembler.topics());
        }
        Ok(result)
    }

    #[instrument(skip_all)]
    fn load_modules(session: &CoreSession, arguments: JsonObject) -> Result<Value, ModuleError> {
        let params: LoadModulesParams = parse(Self::LOAD_MODULES, arguments)?;
        let registry = &session.registry;

        let unknown: Vec<&str> = params
            .modules
            .iter()
            .map(String::as_str)
            .filter(|name| !registry.contains(name))
            .collect();
        if !unknown.is_empty() {
            return Err(DispatchError::unknown_modules(unknown).into());
        }

        let loaded = session.active.extend(params.modules.iter().cloned());
        let added: BTreeSet<String> = loaded.iter().cloned().collect();
        let new_tools = active_tools(registry, &added)
            .into_iter()
            .map(|tool| tool.name().to_string())
            .collect::<Vec<_>>();
        let active = session.active.snapshot();
        let total_tools = active_tools(registry, &active).len();

        if !loaded.is_empty() {
            info!(
                "Loaded modules [{}]: {} new tools, {} total",
                loaded.join(", "),
                new_tools.len(),
                total_tools
            );
        }

        let result = LoadModulesResult {
            loaded_modules: loaded,
            new_tools,
            total_modules: active.len(),
            total_tools,
        };
        serde_json::to_value(result).map_err(|e| ModuleError::rejected(e.to_string()))
    }
}

fn parse<P: DeserializeOwned>(tool: &str, arguments: JsonObject) -> Result<P, ModuleError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|e| ModuleError::rejected(format!("Invalid arguments for '{}': {}", tool, e)))
}

#[async_trait]
impl ServiceModule for CoreModule {
    type Client = CoreSession;

    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        Self::DESCRIPTION
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    async fn connect(&self, _target: &BackendTarget) -> Result<CoreSession, ConnectError> {
        let context = self
            .binding
            .0
            .get()
            .ok_or_else(|| ConnectError::new("core module is not bound to a registry yet"))?;
        let registry = context
            .registry
            .upgrade()
            .ok_or_else(|| ConnectError::new("registry has been dropped"))?;
        Ok(CoreSession {
            registry,
            active: context.active.clone(),
        })
    }

    async fn execute(
        &self,
        client: &CoreSession,
        tool: &str,
        arguments: JsonObject,
    ) -> Result<Value, ModuleError> {
        match tool {
            Self::HELP => Self::help(client, arguments),
            Self::LOAD_MODULES => Self::load_modules(client, arguments),
            other => Err(DispatchError::UnknownTool(other.to_string()).into()),
        }
    }
}
