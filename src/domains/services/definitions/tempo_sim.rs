//! `tempo_sim` module - simulation control, time, AI, sensors and map
//! queries. Most tools need a running Play-In-Editor session.

use schemars::JsonSchema;
use serde::Deserialize;

use crate::domains::services::bridge::{BridgeModule, BridgeTool};

/// Parameters for tempo_advance_steps.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AdvanceStepsParams {
    pub steps: u32,
}

/// Simulation clock.
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeMode {
    WallClock,
    FixedStep,
}

/// Parameters for tempo_set_time_mode.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TimeModeParams {
    pub mode: TimeMode,
}

/// Parameters for tempo_set_sim_rate.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SimRateParams {
    pub steps_per_second: u32,
}

/// Who drives the simulated agents.
#[derive(Debug, Clone, Copy, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMode {
    None,
    User,
    OpenLoop,
    ClosedLoop,
}

/// Parameters for tempo_set_control_mode.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ControlModeParams {
    pub mode: ControlMode,
}

/// Parameters for tempo_load_level.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LoadLevelParams {
    pub level: String,
    /// Defer the load until tempo_finish_loading_level.
    #[serde(default)]
    pub deferred: bool,
    #[serde(default)]
    pub start_paused: bool,
}

/// Parameters for tempo_set_viewport_render.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ViewportRenderParams {
    pub enabled: bool,
}

/// Parameters for tempo_set_date.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DateParams {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

/// Parameters for tempo_set_time_of_day.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TimeOfDayParams {
    pub hour: u32,
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
}

/// Parameters for tempo_set_day_cycle_rate.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DayCycleRateParams {
    /// 1.0 is real time, 60.0 is one hour per minute.
    pub rate: f64,
}

/// Parameters for tempo_set_geographic_reference.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GeographicReferenceParams {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
}

/// Parameters for tempo_get_actor_state.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ActorStateParams {
    pub actor_name: String,
    #[serde(default)]
    pub include_hidden_components: bool,
}

/// Parameters for tempo_get_actors_near.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ActorsNearParams {
    pub near_actor_name: String,
    pub search_radius: f64,
    #[serde(default)]
    pub include_static: bool,
    #[serde(default)]
    pub include_hidden_actors: bool,
    #[serde(default)]
    pub include_hidden_components: bool,
}

/// Parameters for tempo_command_vehicle.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CommandVehicleParams {
    pub vehicle_name: String,
    pub acceleration: f64,
    pub steering: f64,
}

/// Parameters for tempo_pawn_move_to.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PawnMoveToParams {
    pub pawn_name: String,
    /// Target location in centimeters.
    pub location: [f64; 3],
    #[serde(default)]
    pub relative: bool,
}

/// Parameters for tempo_get_lanes and tempo_get_zones.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MapRegionParams {
    pub center: [f64; 3],
    pub radius: f64,
    #[serde(default)]
    pub any_tags: Vec<String>,
    #[serde(default)]
    pub all_tags: Vec<String>,
    #[serde(default)]
    pub none_tags: Vec<String>,
}

/// Parameters for tempo_get_lane_accessibility.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct LaneAccessibilityParams {
    pub from_id: i64,
    pub to_id: i64,
}

/// Tempo simulation.
pub struct TempoSimModule;

impl TempoSimModule {
    pub const NAME: &'static str = "tempo_sim";

    pub const DESCRIPTION: &'static str = "Tempo simulation, time, AI, sensors, and map queries";

    pub fn build() -> BridgeModule {
        BridgeModule::new(
            Self::NAME,
            Self::DESCRIPTION,
            vec![
                BridgeTool::without_params("tempo_play", "Start or resume simulation playback."),
                BridgeTool::without_params("tempo_pause", "Pause simulation playback."),
                BridgeTool::without_params("tempo_step", "Advance the simulation by one step."),
                BridgeTool::with_params::<AdvanceStepsParams>(
                    "tempo_advance_steps",
                    "Advance the simulation by a number of steps.",
                ),
                BridgeTool::with_params::<TimeModeParams>(
                    "tempo_set_time_mode",
                    "Set the time mode: WALL_CLOCK runs in real time, FIXED_STEP at a fixed rate.",
                ),
                BridgeTool::with_params::<SimRateParams>(
                    "tempo_set_sim_rate",
                    "Set the steps per second used in FIXED_STEP mode.",
                ),
                BridgeTool::with_params::<ControlModeParams>(
                    "tempo_set_control_mode",
                    "Set the control mode: NONE, USER, OPEN_LOOP or CLOSED_LOOP.",
                ),
                BridgeTool::with_params::<LoadLevelParams>(
                    "tempo_load_level",
                    "Load a level, optionally deferred and starting paused.",
                ),
                BridgeTool::without_params(
                    "tempo_finish_loading_level",
                    "Complete a deferred level load.",
                ),
                BridgeTool::with_params::<ViewportRenderParams>(
                    "tempo_set_viewport_render",
                    "Enable or disable main viewport rendering.",
                ),
                BridgeTool::with_params::<DateParams>("tempo_set_date", "Set the simulation date."),
                BridgeTool::with_params::<TimeOfDayParams>(
                    "tempo_set_time_of_day",
                    "Set the simulation time of day.",
                ),
                BridgeTool::with_params::<DayCycleRateParams>(
                    "tempo_set_day_cycle_rate",
                    "Set the day/night cycle speed relative to real time.",
                ),
                BridgeTool::without_params(
                    "tempo_get_datetime",
                    "Get the current simulation date and time.",
                ),
                BridgeTool::with_params::<GeographicReferenceParams>(
                    "tempo_set_geographic_reference",
                    "Set the geographic reference point (lat/lon/alt) of the world.",
                ),
                BridgeTool::with_params::<ActorStateParams>(
                    "tempo_get_actor_state",
                    "Get the transform, velocity and bounds of an actor.",
                ),
                BridgeTool::with_params::<ActorsNearParams>(
                    "tempo_get_actors_near",
                    "Get the states of every actor within a radius of a reference actor.",
                ),
                BridgeTool::without_params(
                    "tempo_get_commandable_vehicles",
                    "List the vehicles that accept commands.",
                ),
                BridgeTool::with_params::<CommandVehicleParams>(
                    "tempo_command_vehicle",
                    "Send acceleration and steering commands to a vehicle.",
                ),
                BridgeTool::without_params(
                    "tempo_get_commandable_pawns",
                    "List the pawns that accept move commands.",
                ),
                BridgeTool::with_params::<PawnMoveToParams>(
                    "tempo_pawn_move_to",
                    "Command a pawn to move to a location using navigation.",
                ),
                BridgeTool::without_params(
                    "tempo_rebuild_navigation",
                    "Rebuild the navigation mesh.",
                ),
                BridgeTool::without_params(
                    "tempo_run_zone_graph_builder",
                    "Generate navigation zones for AI agents.",
                ),
                BridgeTool::without_params(
                    "tempo_get_available_sensors",
                    "List the available sensors and their capabilities.",
                ),
                BridgeTool::without_params(
                    "tempo_get_label_map",
                    "Get the mapping from instance ids to semantic label ids.",
                ),
                BridgeTool::with_params::<MapRegionParams>(
                    "tempo_get_lanes",
                    "Get lane data within a radius of a point.",
                ),
                BridgeTool::with_params::<LaneAccessibilityParams>(
                    "tempo_get_lane_accessibility",
                    "Check accessibility between two lanes.",
                ),
                BridgeTool::with_params::<MapRegionParams>(
                    "tempo_get_zones",
                    "Get zone data within a radius of a point.",
                ),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enum_arguments_use_wire_names() {
        let params: TimeModeParams = serde_json::from_value(json!({ "mode": "FIXED_STEP" })).unwrap();
        assert!(matches!(params.mode, TimeMode::FixedStep));

        let params: ControlModeParams =
            serde_json::from_value(json!({ "mode": "CLOSED_LOOP" })).unwrap();
        assert!(matches!(params.mode, ControlMode::ClosedLoop));
    }
}
