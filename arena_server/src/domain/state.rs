// Domain-level simulation entities and input/snapshot types.

use crate::domain::cooldown::Cooldown;
use crate::domain::resources::ResourcePool;
use crate::domain::systems::abilities::{CastRequest, Spellbook};
use crate::domain::systems::dragon::DragonState;
use crate::domain::systems::golem::GolemState;
use crate::domain::systems::movement::{AnimationFlags, MovementContext};
use crate::domain::systems::projectiles::{IceSpike, Projectile};
use crate::domain::systems::teleporter::TeleporterZone;
use glam::{Vec2, Vec3};

/// Opaque handle into the world registry. Ids are never reused, so a handle
/// to a despawned entity simply resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Faction {
    Players,
    Boss,
    Neutral,
}

impl Faction {
    pub fn is_hostile_to(self, other: Faction) -> bool {
        matches!(
            (self, other),
            (Faction::Players, Faction::Boss) | (Faction::Boss, Faction::Players)
        )
    }
}

/// Per-tick input snapshot from the player's client.
///
/// `jump` and the cast slots are held-button states; presses are derived by
/// comparing consecutive ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput {
    /// x = strafe right, y = forward; magnitude at most 1.
    pub move_dir: Vec2,
    pub jump: bool,
    pub sprint: bool,
    pub cast_slot_1: bool,
    pub cast_slot_2: bool,
    /// Camera yaw in degrees (0 = +Z, clockwise seen from above).
    pub camera_yaw: f32,
}

impl PlayerInput {
    pub fn movement_pressed(&self) -> bool {
        self.move_dir.length_squared() > 1e-6
    }

    /// Input to use for a tick with no delivery: continuous values repeat,
    /// edge-triggered buttons read as released.
    pub fn without_edges(&self) -> Self {
        Self {
            jump: false,
            cast_slot_1: false,
            cast_slot_2: false,
            ..*self
        }
    }

    /// Folds a newer input that arrived within the same tick into this one so
    /// a short press is not lost.
    pub fn merge(self, newer: PlayerInput) -> Self {
        Self {
            move_dir: newer.move_dir,
            sprint: newer.sprint,
            camera_yaw: newer.camera_yaw,
            jump: self.jump || newer.jump,
            cast_slot_1: self.cast_slot_1 || newer.cast_slot_1,
            cast_slot_2: self.cast_slot_2 || newer.cast_slot_2,
        }
    }

    /// Horizontal unit vector the camera looks along.
    pub fn camera_forward(&self) -> Vec3 {
        let yaw = self.camera_yaw.to_radians();
        Vec3::new(yaw.sin(), 0.0, yaw.cos())
    }
}

/// Button presses (released last tick, held this tick).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputEdges {
    pub jump: bool,
    pub cast_slot_1: bool,
    pub cast_slot_2: bool,
}

impl InputEdges {
    pub fn between(previous: &PlayerInput, current: &PlayerInput) -> Self {
        Self {
            jump: current.jump && !previous.jump,
            cast_slot_1: current.cast_slot_1 && !previous.cast_slot_1,
            cast_slot_2: current.cast_slot_2 && !previous.cast_slot_2,
        }
    }
}

pub struct PlayerState {
    pub player_id: u64,
    pub health: ResourcePool,
    pub mana: ResourcePool,
    pub movement: MovementContext,
    pub spellbook: Spellbook,

    // Transport buffers, consumed at the start of the next tick.
    pub pending_input: Option<PlayerInput>,
    pub pending_casts: Vec<CastRequest>,

    // Summons owned by this player.
    pub golems: Vec<EntityId>,
    pub dragon: Option<EntityId>,
}

pub struct BossState {
    pub health: ResourcePool,
    pub radius: f32,
    pub fireball: Cooldown,
    pub ice_spikes: Cooldown,
    pub cone_spikes: Cooldown,
}

pub enum EntityKind {
    Player(Box<PlayerState>),
    Boss(BossState),
    Golem(GolemState),
    Dragon(DragonState),
    Fireball(Projectile),
    IceSpike(IceSpike),
    Teleporter(TeleporterZone),
}

pub struct Entity {
    pub id: EntityId,
    pub position: Vec3,
    /// Facing in radians around +Y (0 = +Z).
    pub yaw: f32,
    pub kind: EntityKind,
}

impl Entity {
    pub fn faction(&self) -> Faction {
        match &self.kind {
            EntityKind::Player(_) | EntityKind::Golem(_) | EntityKind::Dragon(_) => {
                Faction::Players
            }
            EntityKind::Boss(_) => Faction::Boss,
            EntityKind::Fireball(p) => p.faction,
            EntityKind::IceSpike(s) => s.faction,
            EntityKind::Teleporter(_) => Faction::Neutral,
        }
    }

    /// Collision radius for bodies that can be hit; `None` for everything else.
    pub fn body_radius(&self) -> Option<f32> {
        match &self.kind {
            EntityKind::Player(p) if !p.health.is_dead() => Some(p.movement.radius),
            EntityKind::Boss(b) if !b.health.is_dead() => Some(b.radius),
            EntityKind::Golem(g) if !g.health.is_dead() => Some(g.radius),
            _ => None,
        }
    }

    pub fn is_alive_body(&self) -> bool {
        self.body_radius().is_some()
    }

    /// Centre of the body sphere; positions are at the feet.
    pub fn body_center(&self) -> Option<Vec3> {
        self.body_radius().map(|r| self.position + Vec3::Y * r)
    }

    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(p) => Some(p),
            _ => None,
        }
    }
}

// Replicated views of the world. These are what leaves the world task.

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: u64,
    pub player_id: u64,
    pub position: Vec3,
    pub yaw: f32,
    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub is_dead: bool,
    pub animation: AnimationFlags,
    pub jump_count: u8,
    // Ticks of the last accepted casts so clients can predict locally.
    pub fireball_cast_tick: Option<u64>,
    pub summon_cast_tick: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BossSnapshot {
    pub id: u64,
    pub position: Vec3,
    pub yaw: f32,
    pub health: f32,
    pub max_health: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GolemSnapshot {
    pub id: u64,
    pub owner_id: u64,
    pub position: Vec3,
    pub yaw: f32,
    pub health: f32,
    pub mode: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DragonSnapshot {
    pub id: u64,
    pub owner_id: u64,
    pub position: Vec3,
    pub yaw: f32,
    pub mode: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileKind {
    Fireball,
    IceSpike,
    ConeIceSpike,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub owner_id: u64,
    pub kind: ProjectileKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub scale: f32,
    /// Growth progress for ice spikes (0..=1); always 1 for fireballs.
    pub height_ratio: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeleporterSnapshot {
    pub id: u64,
    pub position: Vec3,
    pub radius: f32,
    pub occupants: u32,
    pub remaining_seconds: Option<f64>,
}
