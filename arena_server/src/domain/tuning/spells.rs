use serde::Deserialize;

/// Player fireball (slot 1) and the projectile it spawns.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FireballTuning {
    pub cooldown: f64,
    pub mana_cost: f32,
    /// Units per second.
    pub speed: f32,
    pub scale: f32,
    /// Collision radius at scale 1.0.
    pub radius: f32,
    /// Seconds before the projectile despawns.
    pub lifetime: f64,
    pub damage: f32,
    /// Forward offset of the spawn point from the caster.
    pub spawn_forward_offset: f32,
    /// Upward offset of the spawn point from the caster.
    pub spawn_up_offset: f32,
    /// Max distance a client-aimed spawn point may sit from the caster.
    pub max_spawn_offset: f32,
}

impl Default for FireballTuning {
    fn default() -> Self {
        Self {
            cooldown: 5.0,
            mana_cost: 20.0,
            speed: 10.0,
            scale: 1.0,
            radius: 0.5,
            lifetime: 2.0,
            damage: 10.0,
            spawn_forward_offset: 1.5,
            spawn_up_offset: 1.0,
            max_spawn_offset: 3.0,
        }
    }
}

/// Golem summon (slot 2).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct GolemSummonTuning {
    pub cooldown: f64,
    pub mana_cost: f32,
    /// Golems per cast. A new cast replaces the previous batch.
    pub count: u32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Height added above the ground hit so the golem pivot does not clip.
    pub spawn_height_offset: f32,
}

impl Default for GolemSummonTuning {
    fn default() -> Self {
        Self {
            cooldown: 0.0,
            mana_cost: 50.0,
            count: 3,
            min_radius: 3.0,
            max_radius: 6.0,
            spawn_height_offset: 2.0,
        }
    }
}

/// Ice spike entity shared by the targeted and cone variants.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct IceSpikeTuning {
    pub max_height: f32,
    /// Seconds the spike spends growing before it becomes lethal.
    pub telegraph_time: f64,
    pub lifetime: f64,
    pub damage: f32,
    pub radius: f32,
    /// Raycast length used to find the ground under a target.
    pub ground_search_distance: f32,
}

impl Default for IceSpikeTuning {
    fn default() -> Self {
        Self {
            max_height: 5.0,
            telegraph_time: 1.0,
            lifetime: 3.0,
            damage: 15.0,
            radius: 0.75,
            ground_search_distance: 20.0,
        }
    }
}
