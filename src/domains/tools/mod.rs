//! Tools domain module.
//!
//! This module is the tool-dispatch engine: it knows how tools are grouped
//! into service modules, which modules are active, how their backends are
//! connected and how a call is routed. It knows nothing about what any
//! individual tool does; that lives in `domains/services`.
//!
//! ## Architecture
//!
//! - `descriptor.rs` - Agent-facing tool description
//! - `module.rs` - Service module trait and backend target
//! - `registry.rs` - Registration and lookup of modules and tools
//! - `profile.rs` - Profile / module-list resolution into an active set
//! - `connection.rs` - Lazy per-module backend connections
//! - `dispatcher.rs` - Call routing and error normalization
//! - `help.rs` - Help text assembled from the registry
//! - `error.rs` - Error types

mod connection;
mod descriptor;
mod dispatcher;
mod error;
mod help;
mod module;
mod profile;
mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Connection, ConnectionManager, ConnectionStatus};
pub use descriptor::ToolDescriptor;
pub use dispatcher::{ActiveModules, Dispatcher};
pub use error::{ConnectError, DispatchError, ModuleError, RegistryError};
pub use help::{HelpAssembler, OVERVIEW_TOPIC};
pub use module::{
    AnyServiceModule, BackendTarget, ConnectionHandle, HelpTopic, ServiceModule, SharedModule,
};
pub use profile::{ALL_SELECTOR, ModuleSet, Profile, ProfileResolver, Selector, active_tools};
pub use registry::{Registry, RegistryBuilder};
