//! `bp_toolkit` module - live Blueprint and PCG graph editing plus offline
//! asset manipulation on exported JSON.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::domains::services::bridge::{BridgeModule, BridgeTool};

// ============================================================================
// Live Blueprint graphs
// ============================================================================

/// Kind of Blueprint node to create.
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
pub enum BlueprintNodeType {
    CallFunction,
    Event,
    VariableGet,
    VariableSet,
    Branch,
    Sequence,
    Comment,
}

/// Parameters for bp_create_node.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateNodeParams {
    pub blueprint_path: String,
    /// Graph to edit, "EventGraph" by default.
    #[serde(default)]
    pub graph_name: Option<String>,
    pub node_type: BlueprintNodeType,
    /// Function for CallFunction nodes, e.g. "KismetSystemLibrary.PrintString".
    #[serde(default)]
    pub function_reference: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub pos_x: i32,
    #[serde(default)]
    pub pos_y: i32,
}

/// Parameters for bp_connect_pins and bp_disconnect_pins.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PinLinkParams {
    pub blueprint_path: String,
    pub source_node: String,
    pub source_pin: String,
    pub target_node: String,
    pub target_pin: String,
}

/// Parameters for tools addressing one Blueprint node.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BlueprintNodeParams {
    pub blueprint_path: String,
    pub node_id: String,
}

/// Parameters for bp_list_nodes.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListNodesParams {
    pub blueprint_path: String,
    #[serde(default)]
    pub graph_name: Option<String>,
    #[serde(default)]
    pub node_class_filter: Option<String>,
}

// ============================================================================
// Live PCG graphs
// ============================================================================

/// Parameters for pcg_add_node.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PcgAddNodeParams {
    pub graph_path: String,
    /// Node type such as SurfaceSampler, StaticMeshSpawner or FilterByTag.
    pub node_type: String,
    #[serde(default)]
    pub pos_x: i32,
    #[serde(default)]
    pub pos_y: i32,
}

/// Parameters for pcg_connect and pcg_disconnect.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PcgLinkParams {
    pub graph_path: String,
    pub from_node: String,
    pub from_pin: String,
    pub to_node: String,
    pub to_pin: String,
}

/// Parameters for pcg_delete_node.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PcgNodeParams {
    pub graph_path: String,
    pub node_path: String,
}

/// Parameters for tools addressing a whole PCG graph.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PcgGraphParams {
    pub graph_path: String,
}

// ============================================================================
// Offline assets
// ============================================================================

/// Parameters for bp_export_asset.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportAssetParams {
    /// Windows path to the .uasset file (D:/folder/file.uasset).
    pub uasset_path: String,
    #[serde(default)]
    pub ue_version: Option<String>,
}

/// Parameters for bp_import_asset.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ImportAssetParams {
    pub json_path: String,
    #[serde(default)]
    pub ue_version: Option<String>,
}

/// Parameters for tools reading one exported asset.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AssetJsonParams {
    pub json_path: String,
}

/// Parameters for bp_list_properties.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListPropertiesParams {
    pub json_path: String,
    #[serde(default)]
    pub export_index: Option<u32>,
}

/// Parameters for bp_get_property.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AssetGetPropertyParams {
    pub json_path: String,
    /// Path such as "BiomeAssets[0].Generator".
    pub property_path: String,
    #[serde(default)]
    pub export_index: Option<u32>,
}

/// Parameters for bp_set_property.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AssetSetPropertyParams {
    pub json_path: String,
    pub property_path: String,
    pub value: Value,
    #[serde(default)]
    pub export_index: Option<u32>,
    /// Write here instead of modifying the file in place.
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Parameters for bp_clone_asset.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CloneAssetParams {
    pub json_path: String,
    pub new_name: String,
    #[serde(default)]
    pub new_folder_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Parameters for bp_add_comment.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddCommentParams {
    pub json_path: String,
    pub graph_name: String,
    pub text: String,
    #[serde(default)]
    pub x: Option<i32>,
    #[serde(default)]
    pub y: Option<i32>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Parameters for bp_clone_node.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CloneNodeParams {
    pub json_path: String,
    pub node_name: String,
    #[serde(default)]
    pub offset_x: Option<i32>,
    #[serde(default)]
    pub offset_y: Option<i32>,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Parameters for bp_find.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindParams {
    pub json_path: String,
    pub pattern: String,
}

/// Parameters for bp_query.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryParams {
    pub json_path: String,
    /// Query such as "list-events", "list-tasks" or "textures".
    pub query_type: String,
    #[serde(default)]
    pub pattern: Option<String>,
}

/// Parameters for bp_parse.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ParseParams {
    pub json_path: String,
    #[serde(default)]
    pub output_dir: Option<String>,
}

// ============================================================================
// Module Definition
// ============================================================================

/// Blueprint, PCG and offline asset tooling.
pub struct BpToolkitModule;

impl BpToolkitModule {
    pub const NAME: &'static str = "bp_toolkit";

    pub const DESCRIPTION: &'static str = "Blueprint and PCG graphs, offline asset manipulation";

    const HELP: &'static str = r#"
BP TOOLKIT

Live editing (editor running):
  bp_list_nodes -> bp_create_node -> bp_list_pins -> bp_connect_pins
  pcg_list_nodes -> pcg_add_node -> pcg_connect

Offline editing (editor closed):
  bp_export_asset(uasset_path) -> bp_get_property / bp_set_property -> bp_import_asset(json_path)

Offline tools need Windows paths (D:/folder/file.uasset), not WSL paths.
"#;

    const PCG_VOLUME_HELP: &'static str = r#"
PCG VOLUMES

1. spawn_actor(class_name="PCGVolume") sized with get_landscape_bounds
2. set_property(actor_id, path="PCGComponent.Graph", value="/Game/PCG/MyGraph.MyGraph")
3. call_function(call="<volume>.PCGComponent.Generate") to run the graph
"#;

    pub fn build() -> BridgeModule {
        BridgeModule::new(
            Self::NAME,
            Self::DESCRIPTION,
            vec![
                BridgeTool::with_params::<CreateNodeParams>(
                    "bp_create_node",
                    "Create a node in a Blueprint graph. Returns the node GUID and its pins.",
                ),
                BridgeTool::with_params::<PinLinkParams>(
                    "bp_connect_pins",
                    "Connect two pins between Blueprint nodes. Use bp_list_pins to find pin names.",
                ),
                BridgeTool::with_params::<PinLinkParams>(
                    "bp_disconnect_pins",
                    "Disconnect two connected Blueprint pins.",
                ),
                BridgeTool::with_params::<BlueprintNodeParams>(
                    "bp_delete_node",
                    "Delete a node from a Blueprint graph.",
                ),
                BridgeTool::with_params::<ListNodesParams>(
                    "bp_list_nodes",
                    "List the nodes of a Blueprint graph with GUIDs, types, positions and pins.",
                ),
                BridgeTool::with_params::<BlueprintNodeParams>(
                    "bp_list_pins",
                    "List the pins of a Blueprint node with directions, types and connections.",
                ),
                BridgeTool::with_params::<PcgAddNodeParams>(
                    "pcg_add_node",
                    "Add a node to a PCG graph. Returns the created node's path.",
                ),
                BridgeTool::with_params::<PcgLinkParams>(
                    "pcg_connect",
                    "Connect two PCG nodes. Use pcg_list_nodes to discover pin labels.",
                ),
                BridgeTool::with_params::<PcgLinkParams>("pcg_disconnect", "Disconnect two PCG nodes."),
                BridgeTool::with_params::<PcgNodeParams>(
                    "pcg_delete_node",
                    "Delete a node from a PCG graph.",
                ),
                BridgeTool::with_params::<PcgGraphParams>(
                    "pcg_list_nodes",
                    "List the nodes of a PCG graph with their pins.",
                ),
                BridgeTool::with_params::<PcgGraphParams>(
                    "pcg_get_input_output_nodes",
                    "Get the InputNode and OutputNode of a PCG graph.",
                ),
                BridgeTool::with_params::<ExportAssetParams>(
                    "bp_export_asset",
                    "Export a .uasset file to JSON. Returns the JSON path.",
                ),
                BridgeTool::with_params::<ImportAssetParams>(
                    "bp_import_asset",
                    "Import modified JSON back into .uasset format.",
                ),
                BridgeTool::with_params::<AssetJsonParams>(
                    "bp_detect_type",
                    "Detect the asset type of an exported JSON (Blueprint, PCGGraph, DataAsset, ...).",
                ),
                BridgeTool::with_params::<AssetJsonParams>(
                    "bp_get_info",
                    "Summarize an exported asset: type, export count, graphs and name map size.",
                ),
                BridgeTool::with_params::<ListPropertiesParams>(
                    "bp_list_properties",
                    "List the properties of an asset export with types and values.",
                ),
                BridgeTool::with_params::<AssetGetPropertyParams>(
                    "bp_get_property",
                    "Get a property value from an exported asset by path.",
                ),
                BridgeTool::with_params::<AssetSetPropertyParams>(
                    "bp_set_property",
                    "Set a property value in an exported asset by path.",
                ),
                BridgeTool::with_params::<CloneAssetParams>(
                    "bp_clone_asset",
                    "Clone an exported asset under a new name.",
                ),
                BridgeTool::with_params::<AssetJsonParams>(
                    "bp_list_graphs",
                    "List the graphs of a Blueprint or PCG asset.",
                ),
                BridgeTool::with_params::<AddCommentParams>(
                    "bp_add_comment",
                    "Add a comment node to a Blueprint graph.",
                ),
                BridgeTool::with_params::<CloneNodeParams>(
                    "bp_clone_node",
                    "Clone an existing Blueprint node, keeping its pins and connections.",
                ),
                BridgeTool::with_params::<FindParams>(
                    "bp_find",
                    "Search for a pattern in an asset's name map and exports.",
                ),
                BridgeTool::with_params::<QueryParams>(
                    "bp_query",
                    "Run a type-specific query on an exported asset.",
                ),
                BridgeTool::with_params::<ParseParams>(
                    "bp_parse",
                    "Render a Blueprint export as documentation with call graphs.",
                ),
            ],
        )
        .with_topic("bp_workflows", Self::HELP)
        .with_topic("pcg_volume", Self::PCG_VOLUME_HELP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::ServiceModule;
    use serde_json::json;

    #[test]
    fn test_catalog_size() {
        assert_eq!(ServiceModule::tools(&BpToolkitModule::build()).len(), 26);
    }

    #[test]
    fn test_node_type_is_closed_set() {
        let ok: Result<CreateNodeParams, _> = serde_json::from_value(json!({
            "blueprint_path": "/Game/BP_Door",
            "node_type": "Branch",
        }));
        assert!(ok.is_ok());

        let bad: Result<CreateNodeParams, _> = serde_json::from_value(json!({
            "blueprint_path": "/Game/BP_Door",
            "node_type": "Teleport",
        }));
        assert!(bad.is_err());
    }
}
