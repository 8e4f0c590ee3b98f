//! Bridge modules - static tool catalogs forwarded to the engine backend.
//!
//! Every backend-facing module is a [`BridgeModule`]: a name, a description
//! and a list of [`BridgeTool`]s. Arguments are checked against the tool's
//! parameter struct before anything is sent, so malformed calls never reach
//! the backend.

use async_trait::async_trait;
use rmcp::model::JsonObject;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::client::BackendClient;
use crate::domains::tools::{
    BackendTarget, ConnectError, DispatchError, HelpTopic, ModuleError, ServiceModule,
    ToolDescriptor,
};

/// Argument check run before a call is forwarded.
pub type ArgumentCheck = fn(&JsonObject) -> Result<(), String>;

fn check_params<P: DeserializeOwned>(arguments: &JsonObject) -> Result<(), String> {
    serde_json::from_value::<P>(Value::Object(arguments.clone()))
        .map(|_| ())
        .map_err(|e| e.to_string())
}

fn accept_any(_arguments: &JsonObject) -> Result<(), String> {
    Ok(())
}

/// One forwarded tool.
#[derive(Clone)]
pub struct BridgeTool {
    descriptor: ToolDescriptor,
    check: ArgumentCheck,
}

impl BridgeTool {
    /// Tool whose schema and argument check come from `P`.
    pub fn with_params<P>(name: &str, description: &str) -> Self
    where
        P: DeserializeOwned + JsonSchema + 'static,
    {
        Self {
            descriptor: ToolDescriptor::for_params::<P>(name, description),
            check: check_params::<P>,
        }
    }

    /// Tool that takes no arguments.
    pub fn without_params(name: &str, description: &str) -> Self {
        Self {
            descriptor: ToolDescriptor::without_arguments(name, description),
            check: accept_any,
        }
    }

    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    pub fn check(&self, arguments: &JsonObject) -> Result<(), String> {
        (self.check)(arguments)
    }
}

/// A service module whose tools are all executed by the engine backend.
pub struct BridgeModule {
    name: &'static str,
    description: &'static str,
    tools: Vec<BridgeTool>,
    descriptors: Vec<ToolDescriptor>,
    topics: Vec<HelpTopic>,
}

impl BridgeModule {
    pub fn new(name: &'static str, description: &'static str, tools: Vec<BridgeTool>) -> Self {
        let descriptors = tools.iter().map(|t| t.descriptor.clone()).collect();
        Self {
            name,
            description,
            tools,
            descriptors,
            topics: Vec::new(),
        }
    }

    /// Add an extra `help` topic.
    pub fn with_topic(mut self, key: &str, text: &str) -> Self {
        self.topics.push(HelpTopic::new(key, text.trim()));
        self
    }

    fn find(&self, tool: &str) -> Option<&BridgeTool> {
        self.tools.iter().find(|t| t.descriptor.name() == tool)
    }
}

#[async_trait]
impl ServiceModule for BridgeModule {
    type Client = BackendClient;

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    fn help_topics(&self) -> Vec<HelpTopic> {
        self.topics.clone()
    }

    async fn connect(&self, target: &BackendTarget) -> Result<BackendClient, ConnectError> {
        debug!("Module {} connecting to {}", self.name, target.address());
        BackendClient::connect(target).await
    }

    async fn execute(
        &self,
        client: &BackendClient,
        tool: &str,
        arguments: JsonObject,
    ) -> Result<Value, ModuleError> {
        let entry = self
            .find(tool)
            .ok_or_else(|| DispatchError::UnknownTool(tool.to_string()))?;

        if let Err(reason) = entry.check(&arguments) {
            return Err(ModuleError::Application(json!({
                "error": format!("Invalid arguments for '{}': {}", tool, reason),
                "tool": tool,
            })));
        }

        client.call(tool, &arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::services::client::tests::fake_backend;
    use crate::domains::tools::AnyServiceModule;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Deserialize, JsonSchema)]
    struct TargetParams {
        #[allow(dead_code)]
        target: String,
    }

    fn module() -> BridgeModule {
        BridgeModule::new(
            "demo",
            "Demo module",
            vec![
                BridgeTool::with_params::<TargetParams>("get_transform", "Get a transform"),
                BridgeTool::without_params("stop", "Stop"),
            ],
        )
        .with_topic("units", "\nLocation is in centimeters.\n")
    }

    #[test]
    fn test_descriptors_and_topics() {
        let module = module();
        let names: Vec<_> = ServiceModule::tools(&module)
            .iter()
            .map(|t| t.name())
            .collect();
        assert_eq!(names, vec!["get_transform", "stop"]);
        assert_eq!(
            ServiceModule::tools(&module)[0].required_arguments(),
            vec!["target"]
        );
        assert_eq!(
            ServiceModule::help_topics(&module)[0].text,
            "Location is in centimeters."
        );
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_backend() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let (target, _backend) = fake_backend(move |request| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(json!({ "id": request["id"], "result": "ok" }).to_string())
        })
        .await;

        let module: Arc<dyn AnyServiceModule> = Arc::new(module());
        let handle = module.connect_any(&target).await.unwrap();

        let err = module
            .execute_any(&handle, "get_transform", JsonObject::new())
            .await
            .unwrap_err();
        match err {
            ModuleError::Application(payload) => {
                assert_eq!(payload["tool"], "get_transform");
                assert!(payload["error"].as_str().unwrap().contains("target"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        let mut args = JsonObject::new();
        args.insert("target".into(), json!("Cube_1"));
        let result = module
            .execute_any(&handle, "get_transform", args)
            .await
            .unwrap();
        assert_eq!(result, json!("ok"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_core_error() {
        let (target, _backend) = fake_backend(|_| None).await;
        let module = module();
        let client = module.connect(&target).await.unwrap();

        let err = module
            .execute(&client, "spawn_actor", JsonObject::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ModuleError::Core(DispatchError::UnknownTool("spawn_actor".into()))
        );
    }
}
