use serde::Deserialize;

/// Gameplay tuning for player characters.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Ground speed in units per second while walking.
    pub walk_speed: f32,

    /// Multiplier applied to walk speed in the sprint state.
    pub sprint_multiplier: f32,

    /// Multiplier applied to horizontal input while airborne.
    pub air_control: f32,

    /// Apex height of the first jump in units.
    pub max_jump_height: f32,

    /// Full duration of the first jump (up and down) in seconds.
    pub max_jump_time: f32,

    /// Gravity multiplier while descending or after releasing jump.
    pub fall_multiplier: f32,

    /// Downward velocity applied while grounded so the character sticks to slopes.
    pub grounded_gravity: f32,

    /// Fastest allowed fall speed (units per second, positive).
    pub terminal_velocity: f32,

    /// Seconds on the ground before a chained jump sequence resets.
    pub jump_reset_grace: f32,

    /// Body radius used for overlap queries.
    pub radius: f32,

    pub max_health: f32,
    pub max_mana: f32,

    /// Mana regenerated per second.
    pub mana_regen: f32,

    /// Spawn point for newly joined players.
    pub spawn_point: [f32; 3],
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            walk_speed: 6.0,
            sprint_multiplier: 1.7,
            air_control: 0.6,
            max_jump_height: 4.0,
            max_jump_time: 0.75,
            fall_multiplier: 2.0,
            grounded_gravity: -0.05,
            terminal_velocity: 20.0,
            jump_reset_grace: 0.5,
            radius: 0.5,
            max_health: 100.0,
            max_mana: 250.0,
            mana_regen: 2.0,
            spawn_point: [0.0, 0.0, 0.0],
        }
    }
}
