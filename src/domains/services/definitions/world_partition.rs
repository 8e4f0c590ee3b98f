//! `world_partition` module - streaming and landscape queries for large worlds.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::domains::services::bridge::{BridgeModule, BridgeTool};

/// Parameters for query_all_actors.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QueryAllActorsParams {
    pub class_name: Option<String>,
    pub name_pattern: Option<String>,
    /// Include actors in loaded cells (default true).
    pub include_loaded: Option<bool>,
    /// Include actors in unloaded cells (default true).
    pub include_unloaded: Option<bool>,
    pub data_layer: Option<String>,
    pub limit: Option<u32>,
}

/// Parameters for get_streaming_state.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct StreamingStateParams {
    pub actor_guid: String,
}

/// Parameters for query_landscape.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QueryLandscapeParams {
    pub include_unloaded: Option<bool>,
}

/// Parameters for get_actors_in_data_layer.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DataLayerActorsParams {
    pub data_layer: String,
    #[serde(default)]
    pub include_unloaded: Option<bool>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// World Partition streaming queries.
pub struct WorldPartitionModule;

impl WorldPartitionModule {
    pub const NAME: &'static str = "world_partition";

    pub const DESCRIPTION: &'static str = "Large world streaming queries";

    const VOLUME_SIZING_HELP: &'static str = r#"
SIZING VOLUMES TO THE LANDSCAPE

1. get_landscape_bounds() returns min, max, center and extent (cm).
2. spawn_actor the volume at `center`.
3. The default volume brush is 200cm across, so set its scale to
   extent / 100 on each axis.
"#;

    pub fn build() -> BridgeModule {
        BridgeModule::new(
            Self::NAME,
            Self::DESCRIPTION,
            vec![
                BridgeTool::without_params(
                    "is_world_partitioned",
                    "Check whether the current world uses World Partition.",
                ),
                BridgeTool::with_params::<QueryAllActorsParams>(
                    "query_all_actors",
                    "Find actors across loaded and unloaded streaming cells.",
                ),
                BridgeTool::with_params::<StreamingStateParams>(
                    "get_streaming_state",
                    "Get the streaming state (Loaded, Unloaded, Invalid) of an actor by GUID.",
                ),
                BridgeTool::with_params::<QueryLandscapeParams>(
                    "query_landscape",
                    "Query every landscape proxy in the world, including streaming chunks.",
                ),
                BridgeTool::without_params(
                    "get_landscape_bounds",
                    "Get the landscape bounds in world space: min/max corners, center and half-extents.",
                ),
                BridgeTool::without_params(
                    "get_data_layers",
                    "List the data layers defined in the world.",
                ),
                BridgeTool::with_params::<DataLayerActorsParams>(
                    "get_actors_in_data_layer",
                    "List the actors assigned to a data layer.",
                ),
            ],
        )
        .with_topic("volume_sizing", Self::VOLUME_SIZING_HELP)
    }
}
