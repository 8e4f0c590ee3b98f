//! Domains module containing business logic organized by bounded contexts.
//!
//! - **tools**: the module framework (registry, profiles, connections, dispatch)
//! - **services**: the concrete service modules built on it

pub mod services;
pub mod tools;
