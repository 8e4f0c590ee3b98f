//! Module Registry - the process-wide set of service modules.
//!
//! Registration is single-phase: modules are added to a [`RegistryBuilder`]
//! during startup, then [`RegistryBuilder::build`] freezes them into an
//! immutable [`Registry`] that is shared with the dispatcher. There is no way
//! to add or remove a module once the registry is built.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::descriptor::ToolDescriptor;
use super::error::{DispatchError, RegistryError};
use super::module::{ServiceModule, SharedModule};

// ============================================================================
// Builder
// ============================================================================

/// Collects modules in registration order.
#[derive(Default)]
pub struct RegistryBuilder {
    modules: Vec<SharedModule>,
    by_name: HashMap<String, usize>,
    tool_owner: HashMap<String, usize>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module.
    ///
    /// Fails without side effects if the module name or any of its tool names
    /// is already taken.
    pub fn register<M: ServiceModule>(&mut self, module: M) -> Result<&mut Self, RegistryError> {
        self.register_shared(Arc::new(module))
    }

    /// Register an already shared module.
    pub fn register_shared(&mut self, module: SharedModule) -> Result<&mut Self, RegistryError> {
        let name = module.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateModuleName(name));
        }

        // Validate every tool before touching the maps.
        let mut seen = HashSet::new();
        for tool in module.tools() {
            if let Some(&owner) = self.tool_owner.get(tool.name()) {
                return Err(RegistryError::DuplicateToolName {
                    tool: tool.name().to_string(),
                    module: name,
                    existing_module: self.modules[owner].name().to_string(),
                });
            }
            if !seen.insert(tool.name()) {
                return Err(RegistryError::DuplicateToolName {
                    tool: tool.name().to_string(),
                    module: name.clone(),
                    existing_module: name,
                });
            }
        }

        let index = self.modules.len();
        for tool in module.tools() {
            self.tool_owner.insert(tool.name().to_string(), index);
        }
        debug!("Registered module '{}' ({} tools)", name, module.tools().len());
        self.by_name.insert(name, index);
        self.modules.push(module);

        Ok(self)
    }

    /// Freeze the registry.
    pub fn build(self) -> Registry {
        let registry = Registry {
            modules: self.modules,
            by_name: self.by_name,
            tool_owner: self.tool_owner,
        };
        info!(
            "Loaded {} services with {} total tools",
            registry.modules.len(),
            registry.tool_count()
        );
        registry
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable set of registered service modules.
pub struct Registry {
    modules: Vec<SharedModule>,
    by_name: HashMap<String, usize>,
    tool_owner: HashMap<String, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a module by name.
    pub fn lookup_module(&self, name: &str) -> Result<&SharedModule, DispatchError> {
        self.by_name
            .get(name)
            .map(|&index| &self.modules[index])
            .ok_or_else(|| DispatchError::unknown_modules([name]))
    }

    /// Name of the module that owns `tool`.
    pub fn lookup_owner(&self, tool: &str) -> Result<&str, DispatchError> {
        self.tool_owner
            .get(tool)
            .map(|&index| self.modules[index].name())
            .ok_or_else(|| DispatchError::UnknownTool(tool.to_string()))
    }

    /// Every module, in registration order.
    pub fn all_modules(&self) -> &[SharedModule] {
        &self.modules
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Module names in registration order.
    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Position of a module in registration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Look up a tool descriptor by name.
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        let &index = self.tool_owner.get(name)?;
        self.modules[index].tools().iter().find(|t| t.name() == name)
    }

    pub fn tool_count(&self) -> usize {
        self.tool_owner.len()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("modules", &self.module_names())
            .field("tools", &self.tool_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::testing::StubModule;

    #[test]
    fn test_lookup_owner_after_register() {
        let mut builder = Registry::builder();
        builder
            .register(StubModule::new("classes", &["spawn_actor", "delete_actor"]))
            .unwrap()
            .register(StubModule::new("editor", &["stop"]))
            .unwrap();
        let registry = builder.build();

        assert_eq!(registry.lookup_owner("spawn_actor").unwrap(), "classes");
        assert_eq!(registry.lookup_owner("delete_actor").unwrap(), "classes");
        assert_eq!(registry.lookup_owner("stop").unwrap(), "editor");
        assert_eq!(registry.tool_count(), 3);
        assert!(registry.tool("stop").is_some());
    }

    #[test]
    fn test_duplicate_module_name() {
        let mut builder = Registry::builder();
        builder.register(StubModule::new("editor", &["stop"])).unwrap();
        let err = builder
            .register(StubModule::new("editor", &["play"]))
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicateModuleName("editor".into()));

        let registry = builder.build();
        assert!(registry.lookup_owner("play").is_err());
    }

    #[test]
    fn test_duplicate_tool_is_all_or_nothing() {
        let mut builder = Registry::builder();
        builder.register(StubModule::new("a", &["ping"])).unwrap();
        let err = builder
            .register(StubModule::new("b", &["pong", "ping"]))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RegistryError::DuplicateToolName { ref tool, ref existing_module, .. }
                if tool == "ping" && existing_module == "a"
        ));

        let registry = builder.build();
        assert!(matches!(
            registry.lookup_owner("pong"),
            Err(DispatchError::UnknownTool(_))
        ));
        assert!(registry.lookup_module("b").is_err());
        assert_eq!(registry.lookup_owner("ping").unwrap(), "a");
    }

    #[test]
    fn test_duplicate_tool_within_module() {
        let mut builder = Registry::builder();
        let err = builder
            .register(StubModule::new("a", &["ping", "ping"]))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::DuplicateToolName { .. }));
        assert!(builder.build().all_modules().is_empty());
    }

    #[test]
    fn test_registration_order_preserved() {
        let mut builder = Registry::builder();
        for name in ["zeta", "alpha", "mid"] {
            let tool = format!("{name}_tool");
            builder
                .register(StubModule::new(name, &[tool.as_str()]))
                .unwrap();
        }
        let registry = builder.build();
        assert_eq!(registry.module_names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.position("alpha"), Some(1));
    }

    #[test]
    fn test_unknown_lookups() {
        let registry = Registry::builder().build();
        assert_eq!(
            registry.lookup_module("ghost").err().unwrap().kind(),
            "unknown_module"
        );
        assert_eq!(
            registry.lookup_owner("ghost").err().unwrap().kind(),
            "unknown_tool"
        );
    }
}
