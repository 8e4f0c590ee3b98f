//! `classes` module - actors, components, transforms, properties, assets.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domains::services::bridge::{BridgeModule, BridgeTool};

/// Location, rotation or scale triple.
pub type Vector3 = [f64; 3];

// ============================================================================
// Tool Parameters
// ============================================================================

/// Parameters for query_actors.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct QueryActorsParams {
    /// Only actors of this class.
    pub class_name: Option<String>,
    /// Wildcard pattern on the actor name (e.g. "Light*").
    pub name_pattern: Option<String>,
    /// Wildcard pattern on the editor label.
    pub label_pattern: Option<String>,
    /// Only actors carrying this tag.
    pub tag: Option<String>,
    /// Filter by data layer name.
    pub data_layer: Option<String>,
    /// Include actors in unloaded streaming cells.
    pub include_unloaded: bool,
    pub include_hidden: bool,
    /// Maximum number of actors returned (default 100).
    pub limit: Option<u32>,
}

/// Parameters for get_actor.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetActorParams {
    pub actor_id: String,
    #[serde(default)]
    pub include_properties: bool,
    /// Include components; use this to find component instance names.
    #[serde(default)]
    pub include_components: bool,
}

/// Parameters for spawn_actor.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SpawnActorParams {
    /// Class or Blueprint path (the `_C` suffix is added automatically).
    pub class_name: String,
    /// Location in centimeters.
    #[serde(default)]
    pub location: Option<Vector3>,
    /// Rotation in degrees [pitch, yaw, roll].
    #[serde(default)]
    pub rotation: Option<Vector3>,
    #[serde(default)]
    pub scale: Option<Vector3>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub folder_path: Option<String>,
    /// Interpret the transform relative to this actor.
    #[serde(default)]
    pub relative_to: Option<String>,
}

/// Parameters for tools addressing a single actor.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ActorParams {
    pub actor_id: String,
}

/// Parameters for duplicate_actor.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DuplicateActorParams {
    pub actor_id: String,
    #[serde(default)]
    pub location: Option<Vector3>,
    #[serde(default)]
    pub rotation: Option<Vector3>,
    #[serde(default)]
    pub scale: Option<Vector3>,
    #[serde(default)]
    pub new_label: Option<String>,
}

/// Parameters for get_property.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetPropertyParams {
    pub actor_id: String,
    /// Property path such as "RootComponent.RelativeLocation.X".
    pub path: String,
}

/// Parameters for set_property.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetPropertyParams {
    pub actor_id: String,
    pub path: String,
    /// New value. Colors are [R, G, B] arrays.
    pub value: Value,
}

/// Parameters for set_transform.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetTransformParams {
    /// Actor name, or "Actor->Component" for a component.
    pub target: String,
    #[serde(default)]
    pub location: Option<Vector3>,
    #[serde(default)]
    pub rotation: Option<Vector3>,
    #[serde(default)]
    pub scale: Option<Vector3>,
    /// World coordinates when true (default), relative otherwise.
    #[serde(default)]
    pub world_space: Option<bool>,
    /// Add to the current transform instead of replacing it.
    #[serde(default)]
    pub offset: bool,
}

/// Parameters for get_transform.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetTransformParams {
    /// Actor name, or "Actor->Component" for a component.
    pub target: String,
    #[serde(default)]
    pub world_space: Option<bool>,
}

/// How an attached transform is resolved.
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
pub enum AttachRule {
    KeepRelative,
    KeepWorld,
    SnapToTarget,
}

/// Parameters for attach.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AttachParams {
    /// Child actor or "Actor->Component".
    pub child: String,
    /// Parent actor or "Actor->Component".
    pub parent: String,
    #[serde(default)]
    pub socket: Option<String>,
    #[serde(default)]
    pub location_rule: Option<AttachRule>,
    #[serde(default)]
    pub rotation_rule: Option<AttachRule>,
    #[serde(default)]
    pub scale_rule: Option<AttachRule>,
}

/// Parameters for detach.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DetachParams {
    pub target: String,
    #[serde(default)]
    pub maintain_world_transform: Option<bool>,
}

/// Parameters for add_component.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddComponentParams {
    pub actor_id: String,
    pub component_type: String,
    #[serde(default)]
    pub component_name: Option<String>,
}

/// Parameters for call_function.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CallFunctionParams {
    /// "Class::Function" (static), "Actor.Function" (instance) or
    /// "/Asset/Path::Function".
    pub call: String,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
}

/// Parameters for list_classes.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListClassesParams {
    /// Base class, "Actor" by default. Use "ActorComponent" for components.
    pub base_class_name: Option<String>,
    pub name_pattern: Option<String>,
    pub include_blueprint: Option<bool>,
    pub limit: Option<u32>,
}

/// Parameters for get_class_schema.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetClassSchemaParams {
    pub class_name: String,
    #[serde(default)]
    pub include_inherited: Option<bool>,
    #[serde(default)]
    pub include_functions: bool,
}

/// Parameters for create_asset.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateAssetParams {
    pub asset_class: String,
    /// Content folder, e.g. "/Game/Data".
    pub package_path: String,
    pub asset_name: String,
    #[serde(default)]
    pub parent_asset_path: Option<String>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

/// Parameters for save_asset.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveAssetParams {
    pub asset_path: String,
    #[serde(default)]
    pub prompt_for_checkout: bool,
}

/// Parameters for duplicate_asset.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DuplicateAssetParams {
    pub source_path: String,
    pub dest_package_path: String,
    pub dest_asset_name: String,
}

/// Parameters for save_actor_as_blueprint.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveActorAsBlueprintParams {
    pub actor_id: String,
    pub package_path: String,
    pub blueprint_name: String,
    #[serde(default)]
    pub replace_existing: bool,
}

// ============================================================================
// Module Definition
// ============================================================================

/// Actor and asset manipulation.
pub struct ClassesModule;

impl ClassesModule {
    pub const NAME: &'static str = "classes";

    pub const DESCRIPTION: &'static str = "Actors, components, transforms, assets, and functions";

    const ACTORS_HELP: &'static str = r#"
ACTOR OPERATIONS

Finding actors:
  query_actors(class_name="PointLight")   all point lights
  query_actors(name_pattern="Wall*")      wildcard on names
  get_actor(actor_id, include_components=true) to see component names

Transforms:
  set_transform(target="Cube_1", location=[0, 0, 100])
  set_transform(target="Cube_1->StaticMeshComponent0", rotation=[0, 90, 0])
  Locations are centimeters, rotations are degrees [pitch, yaw, roll].

Components use INSTANCE names (LightComponent0), not class names.
"#;

    const PROPERTIES_HELP: &'static str = r#"
PROPERTY OPERATIONS

  get_property(actor_id, path="LightComponent0.Intensity")
  set_property(actor_id, path="LightComponent0.LightColor", value=[255, 0, 0])

Use get_class_schema(class_name) to discover property names and types.
"#;

    pub fn build() -> BridgeModule {
        BridgeModule::new(
            Self::NAME,
            Self::DESCRIPTION,
            vec![
                BridgeTool::with_params::<QueryActorsParams>(
                    "query_actors",
                    "Find actors by class, name, label, tag, or data layer. Use include_unloaded=true for World Partition streaming actors.",
                ),
                BridgeTool::with_params::<GetActorParams>(
                    "get_actor",
                    "Get actor details, optionally with properties and components.",
                ),
                BridgeTool::with_params::<SpawnActorParams>(
                    "spawn_actor",
                    "Spawn a new actor in the world. Specify the class and optionally the transform and label.",
                ),
                BridgeTool::with_params::<ActorParams>(
                    "delete_actor",
                    "Delete an actor from the world.",
                ),
                BridgeTool::with_params::<DuplicateActorParams>(
                    "duplicate_actor",
                    "Create a copy of an existing actor, including all non-transient properties.",
                ),
                BridgeTool::with_params::<GetPropertyParams>(
                    "get_property",
                    "Get a property value from an actor using a property path such as 'RootComponent.RelativeLocation.X'.",
                ),
                BridgeTool::with_params::<SetPropertyParams>(
                    "set_property",
                    "Set a property value on an actor using a property path.",
                ),
                BridgeTool::with_params::<SetTransformParams>(
                    "set_transform",
                    "Set location/rotation/scale on an actor, or on a component with 'Actor->Component'.",
                ),
                BridgeTool::with_params::<GetTransformParams>(
                    "get_transform",
                    "Get the transform of an actor, or of a component with 'Actor->Component'.",
                ),
                BridgeTool::with_params::<AttachParams>(
                    "attach",
                    "Attach an actor or component to a parent.",
                ),
                BridgeTool::with_params::<DetachParams>(
                    "detach",
                    "Detach an actor or component from its parent.",
                ),
                BridgeTool::with_params::<AddComponentParams>(
                    "add_component",
                    "Add a component to an actor.",
                ),
                BridgeTool::with_params::<CallFunctionParams>(
                    "call_function",
                    "Call a function: Class::Function (static), Actor.Function (instance) or /Asset/Path::Function.",
                ),
                BridgeTool::with_params::<ListClassesParams>(
                    "list_classes",
                    "List available classes. Use base_class_name='ActorComponent' for component classes or 'Object' for every type.",
                ),
                BridgeTool::with_params::<GetClassSchemaParams>(
                    "get_class_schema",
                    "Get the properties and functions of any class: actors, components, or other objects.",
                ),
                BridgeTool::with_params::<CreateAssetParams>(
                    "create_asset",
                    "Create a new asset (DataAsset, MaterialInstance, ...) in the Content folder. Editor only.",
                ),
                BridgeTool::with_params::<SaveAssetParams>(
                    "save_asset",
                    "Save a modified asset to disk. Editor only.",
                ),
                BridgeTool::with_params::<DuplicateAssetParams>(
                    "duplicate_asset",
                    "Create a copy of an existing asset. Editor only.",
                ),
                BridgeTool::with_params::<SaveActorAsBlueprintParams>(
                    "save_actor_as_blueprint",
                    "Convert an actor to a reusable Blueprint asset. Editor only.",
                ),
            ],
        )
        .with_topic("actors", Self::ACTORS_HELP)
        .with_topic("properties", Self::PROPERTIES_HELP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::ServiceModule;
    use serde_json::json;

    #[test]
    fn test_catalog() {
        let module = ClassesModule::build();
        let tools = ServiceModule::tools(&module);
        assert_eq!(tools.len(), 19);
        let spawn = tools.iter().find(|t| t.name() == "spawn_actor").unwrap();
        assert_eq!(spawn.required_arguments(), vec!["class_name"]);
    }

    #[test]
    fn test_vector_arguments_must_be_triples() {
        let ok: Result<SpawnActorParams, _> = serde_json::from_value(json!({
            "class_name": "PointLight",
            "location": [0.0, 0.0, 500.0],
        }));
        assert!(ok.is_ok());

        let short: Result<SpawnActorParams, _> = serde_json::from_value(json!({
            "class_name": "PointLight",
            "location": [0.0, 500.0],
        }));
        assert!(short.is_err());
    }

    #[test]
    fn test_set_property_requires_value() {
        let missing: Result<SetPropertyParams, _> =
            serde_json::from_value(json!({ "actor_id": "Light_1", "path": "Intensity" }));
        assert!(missing.is_err());
    }
}
