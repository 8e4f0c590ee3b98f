//! Backend module catalogs.
//!
//! Each module is defined in its own file; `build()` returns the finished
//! [`BridgeModule`](super::bridge::BridgeModule).

pub mod bp_toolkit;
pub mod classes;
pub mod editor;
pub mod files;
pub mod tempo_sim;
pub mod world_partition;

pub use bp_toolkit::BpToolkitModule;
pub use classes::ClassesModule;
pub use editor::EditorModule;
pub use files::FilesModule;
pub use tempo_sim::TempoSimModule;
pub use world_partition::WorldPartitionModule;
