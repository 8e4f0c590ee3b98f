//! Tool descriptors - the immutable, agent-facing description of one tool.

use std::sync::Arc;

use rmcp::{
    handler::server::tool::schema_for_type,
    model::{JsonObject, Tool},
};
use schemars::JsonSchema;

/// One invocable operation: name, human description and argument schema.
///
/// Descriptors are plain data. The name must be unique across every module
/// registered in a [`Registry`](super::Registry); that is checked at
/// registration time, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    input_schema: Arc<JsonObject>,
}

impl ToolDescriptor {
    /// Create a descriptor from a literal JSON-Schema object.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: JsonObject,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Arc::new(input_schema),
        }
    }

    /// Create a descriptor whose schema is derived from a parameter struct.
    pub fn for_params<P: JsonSchema + 'static>(
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Arc::new(schema_for_type::<P>()),
        }
    }

    /// Create a descriptor for a tool that takes no arguments.
    pub fn without_arguments(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), serde_json::json!("object"));
        Self::new(name, description, schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Arc<JsonObject> {
        &self.input_schema
    }

    /// Names of the arguments the schema marks as required.
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(|v| v.as_array())
            .map(|names| names.iter().filter_map(|n| n.as_str()).collect())
            .unwrap_or_default()
    }

    /// Render the rmcp `Tool` model advertised in `tools/list`.
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone().into(),
            description: Some(self.description.clone().into()),
            input_schema: self.input_schema.clone(),
            annotations: None,
            output_schema: None,
            icons: None,
            meta: None,
            title: None,
        }
    }

    /// JSON form used by the HTTP transport.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema.as_ref(),
        })
    }
}
