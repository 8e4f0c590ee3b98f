//! Profile resolution - which registered modules are active for a run.
//!
//! A [`Selector`] is either a named [`Profile`], an explicit module list or
//! [`Selector::All`]. The resolver is stateless: every call reads the
//! registry afresh, so it is safe to call as often as needed.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::descriptor::ToolDescriptor;
use super::error::DispatchError;
use super::registry::Registry;

/// Selector value that means "every registered module".
pub const ALL_SELECTOR: &str = "all";

/// Set of module names.
pub type ModuleSet = BTreeSet<String>;

/// A named selection of modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub modules: Vec<String>,
}

impl Profile {
    pub fn new<I, S>(name: impl Into<String>, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }
}

/// What to activate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Profile(String),
    Modules(Vec<String>),
    All,
}

impl Selector {
    /// Selector for a profile name, mapping `"all"` to [`Selector::All`].
    pub fn profile(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case(ALL_SELECTOR) {
            Self::All
        } else {
            Self::Profile(name)
        }
    }

    pub fn modules<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Modules(names.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Profile(name) => write!(f, "profile '{}'", name),
            Self::Modules(names) => write!(f, "modules [{}]", names.join(", ")),
            Self::All => write!(f, "all modules"),
        }
    }
}

/// Maps selectors to module sets against a registry.
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    registry: Arc<Registry>,
    profiles: Vec<Profile>,
}

impl ProfileResolver {
    pub fn new(registry: Arc<Registry>, profiles: Vec<Profile>) -> Self {
        Self { registry, profiles }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Resolve a selector into the set of module names it activates.
    ///
    /// Unknown module names are collected and reported together.
    pub fn resolve(&self, selector: &Selector) -> Result<ModuleSet, DispatchError> {
        let names: Vec<&str> = match selector {
            Selector::All => {
                return Ok(self
                    .registry
                    .module_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect());
            }
            Selector::Profile(name) => {
                let profile = self.profile(name).ok_or_else(|| DispatchError::UnknownProfile {
                    name: name.clone(),
                    available: self.profiles.iter().map(|p| p.name.clone()).collect(),
                })?;
                profile.modules.iter().map(String::as_str).collect()
            }
            Selector::Modules(names) => names.iter().map(String::as_str).collect(),
        };

        let unknown: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| !self.registry.contains(name))
            .collect();
        if !unknown.is_empty() {
            return Err(DispatchError::unknown_modules(unknown));
        }

        let set: ModuleSet = names.into_iter().map(str::to_string).collect();
        debug!("Resolved {} to {} modules", selector, set.len());
        Ok(set)
    }

    /// Tools of the selected modules, in registration order.
    pub fn active_tools(&self, modules: &ModuleSet) -> Vec<ToolDescriptor> {
        active_tools(&self.registry, modules)
    }

    /// Number of tools a profile activates, if every member is registered.
    pub fn tool_count(&self, selector: &Selector) -> Result<usize, DispatchError> {
        Ok(self.active_tools(&self.resolve(selector)?).len())
    }
}

/// Concatenate the tools of `modules` in registry order.
pub fn active_tools(registry: &Registry, modules: &ModuleSet) -> Vec<ToolDescriptor> {
    registry
        .all_modules()
        .iter()
        .filter(|module| modules.contains(module.name()))
        .flat_map(|module| module.tools().iter().cloned())
        .collect()
}
