//! Tool-domain error types.
//!
//! Errors are split by when they can happen:
//! - [`RegistryError`] only while the registry is being built (startup-fatal)
//! - [`DispatchError`] for everything a running server reports back to a caller
//! - [`ModuleError`] / [`ConnectError`] are what service modules return

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

/// Registration-time errors. Any of these aborts startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// A module with the same name is already registered.
    #[error("Duplicate module name: {0}")]
    DuplicateModuleName(String),

    /// A tool name collides with an already registered tool.
    #[error("Duplicate tool name '{tool}': module '{module}' collides with '{existing_module}'")]
    DuplicateToolName {
        tool: String,
        module: String,
        existing_module: String,
    },
}

/// Errors surfaced to the calling agent by resolution and dispatch.
///
/// None of these crash the process; each one carries a stable [`kind`](Self::kind)
/// plus enough context (module, tool) to diagnose the failure.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Unknown module(s): {}", .names.join(", "))]
    UnknownModule { names: Vec<String> },

    #[error("Unknown profile '{name}' (available: {})", .available.join(", "))]
    UnknownProfile { name: String, available: Vec<String> },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(
        "Tool '{tool}' is not loaded. Load module '{module}' first: load_modules(modules=[\"{module}\"])"
    )]
    ToolNotActive { tool: String, module: String },

    #[error("Unknown help topic '{topic}'")]
    UnknownTopic { topic: String, available: Vec<String> },

    #[error("Failed to connect module '{module}': {reason}")]
    ConnectionFailed { module: String, reason: String },

    #[error("Backend for module '{module}' unavailable while running '{tool}': {reason}")]
    BackendUnavailable {
        module: String,
        tool: String,
        reason: String,
    },

    #[error("Tool '{tool}' failed in module '{module}': {payload}")]
    ToolExecution {
        module: String,
        tool: String,
        payload: Value,
    },
}

impl DispatchError {
    /// Create an "unknown module" error from any list of names.
    pub fn unknown_modules<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::UnknownModule {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownModule { .. } => "unknown_module",
            Self::UnknownProfile { .. } => "unknown_profile",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ToolNotActive { .. } => "tool_not_active",
            Self::UnknownTopic { .. } => "unknown_topic",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::BackendUnavailable { .. } => "backend_unavailable",
            Self::ToolExecution { .. } => "tool_execution_error",
        }
    }

    /// Whether this error was caused by the backend transport (and therefore
    /// by a dropped or never established connection).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::BackendUnavailable { .. }
        )
    }

    /// Structured JSON body reported to the agent.
    pub fn to_json(&self) -> Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        match self {
            Self::ToolNotActive { tool, module } => {
                error["tool"] = json!(tool);
                error["module"] = json!(module);
            }
            Self::ConnectionFailed { module, .. } => {
                error["module"] = json!(module);
            }
            Self::BackendUnavailable { module, tool, .. } => {
                error["module"] = json!(module);
                error["tool"] = json!(tool);
            }
            Self::ToolExecution {
                module,
                tool,
                payload,
            } => {
                error["module"] = json!(module);
                error["tool"] = json!(tool);
                error["payload"] = payload.clone();
            }
            Self::UnknownTool(tool) => {
                error["tool"] = json!(tool);
            }
            Self::UnknownModule { names } => {
                error["modules"] = json!(names);
            }
            Self::UnknownProfile { available, .. } => {
                error["available_profiles"] = json!(available);
            }
            Self::UnknownTopic { available, .. } => {
                error["available_topics"] = json!(available);
            }
        }
        json!({ "error": error })
    }
}

/// Failure reported by a module's `execute`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModuleError {
    /// The backend is unreachable or the connection broke mid-call.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The backend was reached and rejected the call. The payload is passed
    /// through to the caller untouched.
    #[error("Rejected by backend: {0}")]
    Application(Value),

    /// A core usage error raised by a built-in module.
    #[error(transparent)]
    Core(#[from] DispatchError),
}

impl ModuleError {
    /// Create a transport-class failure.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an application-class failure with a plain message payload.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Application(json!({ "error": msg.into() }))
    }
}

/// Failure reported by a module's `connect`.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{0}")]
pub struct ConnectError(String);

impl ConnectError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn timed_out(after: Duration) -> Self {
        Self(format!("connect timed out after {}ms", after.as_millis()))
    }
}

impl From<std::io::Error> for ConnectError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}
