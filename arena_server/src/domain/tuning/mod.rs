// Gameplay tuning tables. Every struct has sensible defaults and can be
// partially overridden from a TOML file (see `frameworks::config`).

pub mod arena;
pub mod boss;
pub mod pets;
pub mod player;
pub mod spells;

use crate::domain::errors::WorldError;
use serde::Deserialize;

pub use arena::{ArenaTuning, TeleporterTuning};
pub use boss::BossTuning;
pub use pets::{DragonTuning, GolemTuning};
pub use player::PlayerTuning;
pub use spells::{FireballTuning, GolemSummonTuning, IceSpikeTuning};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub arena: ArenaTuning,
    pub player: PlayerTuning,
    pub fireball: FireballTuning,
    pub golem_summon: GolemSummonTuning,
    pub ice_spike: IceSpikeTuning,
    pub boss: BossTuning,
    pub golem: GolemTuning,
    pub dragon: DragonTuning,
    pub teleporters: Vec<TeleporterTuning>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            arena: ArenaTuning::default(),
            player: PlayerTuning::default(),
            fireball: FireballTuning::default(),
            golem_summon: GolemSummonTuning::default(),
            ice_spike: IceSpikeTuning::default(),
            boss: BossTuning::default(),
            golem: GolemTuning::default(),
            dragon: DragonTuning::default(),
            teleporters: vec![TeleporterTuning::default()],
        }
    }
}

/// Most spawns one boss volley or one cone spike row may produce.
pub const MAX_SPAWNS_PER_CAST: u32 = 64;
/// Most rows in one cone spike cast.
pub const MAX_CONE_ROWS: u32 = 16;

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

fn valid_duration(seconds: f64) -> bool {
    seconds.is_finite() && seconds >= 0.0
}

fn require(ok: bool, reason: &'static str) -> Result<(), WorldError> {
    if ok {
        Ok(())
    } else {
        Err(WorldError::InvalidTuning(reason))
    }
}

impl Tuning {
    /// Stock arena: default values and the single teleporter.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Rejects values that would leave a system without a defined behaviour
    /// or let one cast spawn an unbounded number of entities.
    pub fn validate(&self) -> Result<(), WorldError> {
        let p = &self.player;
        require(
            positive(p.max_jump_height) && positive(p.max_jump_time),
            "jump height and time must be positive",
        )?;
        require(
            positive(p.max_health) && non_negative(p.max_mana),
            "player pools must have a positive max",
        )?;
        require(
            positive(p.radius) && non_negative(p.walk_speed) && positive(p.terminal_velocity),
            "player radius, speed and terminal velocity must be finite",
        )?;

        let f = &self.fireball;
        require(
            positive(f.radius) && positive(f.scale),
            "fireball radius and scale must be positive",
        )?;
        require(
            non_negative(f.speed) && non_negative(f.max_spawn_offset),
            "fireball speed and spawn offset must be finite",
        )?;
        require(
            valid_duration(f.cooldown) && valid_duration(f.lifetime),
            "fireball cooldown and lifetime must be finite",
        )?;

        let g = &self.golem_summon;
        require(
            non_negative(g.min_radius) && non_negative(g.max_radius),
            "golem summon radii must be finite",
        )?;
        require(
            g.min_radius <= g.max_radius,
            "golem summon annulus is inverted",
        )?;
        require(
            g.count <= MAX_SPAWNS_PER_CAST,
            "golem summon count is too large",
        )?;
        require(valid_duration(g.cooldown), "golem summon cooldown must be finite")?;

        let i = &self.ice_spike;
        require(
            positive(i.radius) && positive(i.max_height),
            "ice spike radius and height must be positive",
        )?;
        require(
            valid_duration(i.telegraph_time) && valid_duration(i.lifetime) && i.lifetime > 0.0,
            "ice spike timings must be positive",
        )?;

        let b = &self.boss;
        require(
            positive(b.max_health) && positive(b.radius),
            "boss health and radius must be positive",
        )?;
        require(
            (1..=MAX_SPAWNS_PER_CAST).contains(&b.fireball_count),
            "boss fireball count must be between 1 and 64",
        )?;
        require(
            b.fireball_cone_angle.is_finite() && (0.0..=180.0).contains(&b.fireball_cone_angle),
            "boss fireball cone angle must be within 0..=180 degrees",
        )?;
        require(
            b.ice_spike_max_targets <= MAX_SPAWNS_PER_CAST,
            "boss ice spike target count is too large",
        )?;
        require(
            b.cone_spike_rows <= MAX_CONE_ROWS,
            "boss cone spike rows must be at most 16",
        )?;
        require(
            positive(b.cone_spike_half_angle) && b.cone_spike_half_angle < 90.0,
            "cone spike half angle must be within (0, 90) degrees",
        )?;
        require(
            positive(b.cone_spike_row_spacing) && positive(b.cone_spike_spacing),
            "cone spike spacing must be positive",
        )?;
        require(
            valid_duration(b.fireball_interval)
                && valid_duration(b.ice_spike_interval)
                && valid_duration(b.cone_spike_interval),
            "boss intervals must be finite",
        )?;

        require(
            positive(self.golem.max_health) && positive(self.golem.radius),
            "health pools must have a positive max",
        )?;
        require(
            valid_duration(self.golem.attack_rate) && valid_duration(self.dragon.attack_interval),
            "pet attack intervals must be finite",
        )?;

        require(
            self.teleporters
                .iter()
                .all(|t| positive(t.radius) && valid_duration(t.teleport_time)),
            "teleporter radius must be positive",
        )?;
        Ok(())
    }
}
