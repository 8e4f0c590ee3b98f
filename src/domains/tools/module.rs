//! Service module contract.
//!
//! A service module is a named bundle of tools sharing one backend. Module
//! authors implement the typed [`ServiceModule`] trait; the registry stores
//! modules behind the object-safe [`AnyServiceModule`] so that modules with
//! different client types can live side by side.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::JsonObject;
use serde_json::Value;

use super::descriptor::ToolDescriptor;
use super::error::{ConnectError, ModuleError};

/// Where and how modules reach their backend.
///
/// The core never interprets these values beyond handing them to
/// [`ServiceModule::connect`] and bounding calls with `timeout`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendTarget {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    /// Location of generated backend stubs, if overridden.
    pub stub_path: Option<PathBuf>,
}

impl BackendTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(30),
            stub_path: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Extra documentation a module contributes to the `help` tool.
#[derive(Debug, Clone, PartialEq)]
pub struct HelpTopic {
    pub key: String,
    pub text: String,
}

impl HelpTopic {
    pub fn new(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
        }
    }
}

/// A named bundle of tools plus the two functions needed to run them.
#[async_trait]
pub trait ServiceModule: Send + Sync + 'static {
    /// Live connection to this module's backend.
    type Client: Send + Sync + 'static;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Tools in the order they should be advertised.
    fn tools(&self) -> &[ToolDescriptor];

    fn help_topics(&self) -> Vec<HelpTopic> {
        Vec::new()
    }

    /// Establish a backend connection.
    async fn connect(&self, target: &BackendTarget) -> Result<Self::Client, ConnectError>;

    /// Execute one of this module's tools against a live connection.
    async fn execute(
        &self,
        client: &Self::Client,
        tool: &str,
        arguments: JsonObject,
    ) -> Result<Value, ModuleError>;
}

/// Type-erased connection handle, as cached by the connection manager.
pub type ConnectionHandle = Arc<dyn Any + Send + Sync>;

/// Object-safe view of a [`ServiceModule`].
///
/// Implemented for every `ServiceModule`; there is no reason to implement it
/// by hand.
#[async_trait]
pub trait AnyServiceModule: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn tools(&self) -> &[ToolDescriptor];

    fn help_topics(&self) -> Vec<HelpTopic>;

    async fn connect_any(&self, target: &BackendTarget) -> Result<ConnectionHandle, ConnectError>;

    async fn execute_any(
        &self,
        handle: &ConnectionHandle,
        tool: &str,
        arguments: JsonObject,
    ) -> Result<Value, ModuleError>;
}

#[async_trait]
impl<M: ServiceModule> AnyServiceModule for M {
    fn name(&self) -> &str {
        ServiceModule::name(self)
    }

    fn description(&self) -> &str {
        ServiceModule::description(self)
    }

    fn tools(&self) -> &[ToolDescriptor] {
        ServiceModule::tools(self)
    }

    fn help_topics(&self) -> Vec<HelpTopic> {
        ServiceModule::help_topics(self)
    }

    async fn connect_any(&self, target: &BackendTarget) -> Result<ConnectionHandle, ConnectError> {
        let client = self.connect(target).await?;
        let handle: ConnectionHandle = Arc::new(client);
        Ok(handle)
    }

    async fn execute_any(
        &self,
        handle: &ConnectionHandle,
        tool: &str,
        arguments: JsonObject,
    ) -> Result<Value, ModuleError> {
        let client = handle.downcast_ref::<M::Client>().ok_or_else(|| {
            ModuleError::transport(format!(
                "connection handle does not belong to module '{}'",
                ServiceModule::name(self)
            ))
        })?;
        self.execute(client, tool, arguments).await
    }
}

/// A registered module as shared by the registry and dispatcher.
pub type SharedModule = Arc<dyn AnyServiceModule>;
