//! `editor` module - play-in-editor, levels, worlds and the console.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::domains::services::bridge::{BridgeModule, BridgeTool};

/// Parameters for set_target_world.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetTargetWorldParams {
    /// World name or index as returned by list_worlds.
    pub world_identifier: String,
}

/// Parameters for save_level.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveLevelParams {
    pub path: String,
    #[serde(default)]
    pub overwrite: bool,
}

/// Parameters for open_level.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct OpenLevelParams {
    pub path: String,
}

/// Parameters for execute_console_command.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConsoleCommandParams {
    pub command: String,
}

/// Parameters for search_console_commands.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchConsoleParams {
    pub keyword: String,
    #[serde(default)]
    pub limit: Option<u32>,
    /// Skip this many matches, for paging.
    #[serde(default)]
    pub offset: Option<u32>,
    /// Also match against help text.
    #[serde(default)]
    pub search_help: bool,
}

/// Editor session and level management.
pub struct EditorModule;

impl EditorModule {
    pub const NAME: &'static str = "editor";

    pub const DESCRIPTION: &'static str = "Editor PIE, level management, worlds and console";

    const CONSOLE_HELP: &'static str = r#"
CONSOLE COMMANDS

  search_console_commands(keyword="shadow")   discover commands and CVars
  execute_console_command(command="stat fps")  run anything not covered by a tool

Results are paged: pass offset to continue a search.
"#;

    const WORKFLOWS_HELP: &'static str = r#"
WORKFLOWS

Simulation tools need a running session:
  1. play_in_editor
  2. load the tempo_sim module and use tempo_* tools
  3. stop

Level editing:
  open_level(path) -> edit with the classes module -> save_level(path)
"#;

    pub fn build() -> BridgeModule {
        BridgeModule::new(
            Self::NAME,
            Self::DESCRIPTION,
            vec![
                BridgeTool::without_params(
                    "play_in_editor",
                    "Start a Play-In-Editor session. Required for simulation tools.",
                ),
                BridgeTool::without_params(
                    "simulate",
                    "Start Simulate mode: physics without player control.",
                ),
                BridgeTool::without_params("stop", "Stop the current PIE or Simulate session."),
                BridgeTool::with_params::<SaveLevelParams>(
                    "save_level",
                    "Save the current level to a file.",
                ),
                BridgeTool::with_params::<OpenLevelParams>("open_level", "Open a level in the editor."),
                BridgeTool::without_params("new_level", "Create a new empty level in the editor."),
                BridgeTool::without_params(
                    "get_current_level",
                    "Get the name of the currently loaded level.",
                ),
                BridgeTool::without_params("list_worlds", "List available world contexts."),
                BridgeTool::with_params::<SetTargetWorldParams>(
                    "set_target_world",
                    "Switch the world that subsequent operations target.",
                ),
                BridgeTool::without_params("quit", "Quit the engine application."),
                BridgeTool::with_params::<ConsoleCommandParams>(
                    "execute_console_command",
                    "Execute an arbitrary console command. Use this for operations not covered by other tools.",
                ),
                BridgeTool::with_params::<SearchConsoleParams>(
                    "search_console_commands",
                    "Search console commands and CVars by keyword.",
                ),
            ],
        )
        .with_topic("console", Self::CONSOLE_HELP)
        .with_topic("workflows", Self::WORKFLOWS_HELP)
    }
}
