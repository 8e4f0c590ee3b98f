//! `files` module - project file operations, executed by the backend inside
//! the project root.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::domains::services::bridge::{BridgeModule, BridgeTool};

/// Parameters for read_project_file.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadProjectFileParams {
    /// Path relative to the project root.
    pub relative_path: String,
    /// Return the content base64-encoded.
    #[serde(default)]
    pub as_base64: bool,
}

/// Parameters for write_project_file.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteProjectFileParams {
    pub relative_path: String,
    pub content: String,
    #[serde(default)]
    pub is_base64: bool,
    /// Create missing parent directories (default true).
    #[serde(default)]
    pub create_directories: Option<bool>,
    #[serde(default)]
    pub append: bool,
}

/// Parameters for list_project_directory.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ListProjectDirectoryParams {
    pub relative_path: Option<String>,
    /// Glob pattern on file names.
    pub pattern: Option<String>,
    pub recursive: bool,
    pub limit: Option<u32>,
}

/// Parameters for copy_project_file.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CopyProjectFileParams {
    pub source_path: String,
    pub dest_path: String,
    #[serde(default)]
    pub overwrite: bool,
}

/// Project file access.
pub struct FilesModule;

impl FilesModule {
    pub const NAME: &'static str = "files";

    pub const DESCRIPTION: &'static str = "Project file operations";

    pub fn build() -> BridgeModule {
        BridgeModule::new(
            Self::NAME,
            Self::DESCRIPTION,
            vec![
                BridgeTool::with_params::<ReadProjectFileParams>(
                    "read_project_file",
                    "Read a file from the project directory. Constrained to safe paths.",
                ),
                BridgeTool::with_params::<WriteProjectFileParams>(
                    "write_project_file",
                    "Write a file to the project directory. Constrained to safe paths.",
                ),
                BridgeTool::with_params::<ListProjectDirectoryParams>(
                    "list_project_directory",
                    "List files in a project directory. Constrained to safe paths.",
                ),
                BridgeTool::with_params::<CopyProjectFileParams>(
                    "copy_project_file",
                    "Copy a file within the project directory. Constrained to safe paths.",
                ),
            ],
        )
    }
}
