//! Services domain module.
//!
//! The concrete service modules this server ships, and the profiles that
//! select among them.
//!
//! ## Adding a module
//!
//! 1. Create a definition file under `definitions/` with a `build()` function
//! 2. Export it from `definitions/mod.rs`
//! 3. Add it to [`register_all`] and to the profiles that should include it

pub mod bridge;
pub mod client;
pub mod core;
pub mod definitions;

use crate::domains::tools::{Profile, Registry, RegistryError};

pub use bridge::{BridgeModule, BridgeTool};
pub use client::BackendClient;
pub use core::{CoreBinding, CoreModule};
pub use definitions::{
    BpToolkitModule, ClassesModule, EditorModule, FilesModule, TempoSimModule,
    WorldPartitionModule,
};

/// Profile used when none is configured.
pub const DEFAULT_PROFILE: &str = "full";

/// Register every shipped module, in advertisement order.
///
/// Fails on the first duplicate module or tool name.
pub fn register_all(core: CoreBinding) -> Result<Registry, RegistryError> {
    let mut builder = Registry::builder();
    builder
        .register(CoreModule::new(core))?
        .register(ClassesModule::build())?
        .register(EditorModule::build())?
        .register(WorldPartitionModule::build())?
        .register(FilesModule::build())?
        .register(BpToolkitModule::build())?
        .register(TempoSimModule::build())?;
    Ok(builder.build())
}

/// The built-in profiles.
pub fn default_profiles() -> Vec<Profile> {
    vec![
        Profile::new("core", [CoreModule::NAME]),
        Profile::new(
            "standard",
            [
                CoreModule::NAME,
                ClassesModule::NAME,
                EditorModule::NAME,
                FilesModule::NAME,
            ],
        ),
        Profile::new(
            "editor",
            [
                CoreModule::NAME,
                ClassesModule::NAME,
                EditorModule::NAME,
                WorldPartitionModule::NAME,
                FilesModule::NAME,
            ],
        ),
        Profile::new(
            "scripting",
            [
                CoreModule::NAME,
                ClassesModule::NAME,
                EditorModule::NAME,
                FilesModule::NAME,
                BpToolkitModule::NAME,
            ],
        ),
        Profile::new(
            "simulation",
            [CoreModule::NAME, ClassesModule::NAME, TempoSimModule::NAME],
        ),
        Profile::new(
            DEFAULT_PROFILE,
            [
                CoreModule::NAME,
                ClassesModule::NAME,
                EditorModule::NAME,
                WorldPartitionModule::NAME,
                FilesModule::NAME,
                BpToolkitModule::NAME,
                TempoSimModule::NAME,
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::{ProfileResolver, Selector};
    use std::sync::Arc;

    fn resolver() -> ProfileResolver {
        let registry = register_all(CoreBinding::new()).unwrap();
        ProfileResolver::new(Arc::new(registry), default_profiles())
    }

    #[test]
    fn test_shipped_catalog_has_unique_names() {
        let registry = register_all(CoreBinding::new()).unwrap();
        assert_eq!(
            registry.module_names(),
            vec![
                "core",
                "classes",
                "editor",
                "world_partition",
                "files",
                "bp_toolkit",
                "tempo_sim"
            ]
        );
        assert_eq!(registry.tool_count(), 98);
    }

    #[test]
    fn test_every_profile_resolves() {
        let resolver = resolver();
        for profile in default_profiles() {
            let set = resolver
                .resolve(&Selector::profile(profile.name.as_str()))
                .unwrap();
            assert!(set.contains(CoreModule::NAME), "{} lacks core", profile.name);
        }
    }

    #[test]
    fn test_profile_sizes() {
        let resolver = resolver();
        assert_eq!(resolver.tool_count(&Selector::profile("core")).unwrap(), 2);
        assert_eq!(resolver.tool_count(&Selector::profile("standard")).unwrap(), 37);
        assert_eq!(
            resolver.tool_count(&Selector::profile(DEFAULT_PROFILE)).unwrap(),
            resolver.tool_count(&Selector::All).unwrap()
        );
    }
}
