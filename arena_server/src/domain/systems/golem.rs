// Summoned golems: orbit the owner, chase the boss once it is in aggro range
// and punch it on a fixed cadence.

use crate::domain::cooldown::Cooldown;
use crate::domain::resources::ResourcePool;
use crate::domain::state::{EntityId, EntityKind, Faction};
use crate::domain::tuning::GolemTuning;
use crate::domain::world::World;
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GolemMode {
    Roaming,
    Pursuing(EntityId),
    Attacking(EntityId),
}

impl GolemMode {
    pub fn label(&self) -> &'static str {
        match self {
            GolemMode::Roaming => "roaming",
            GolemMode::Pursuing(_) => "pursuing",
            GolemMode::Attacking(_) => "attacking",
        }
    }
}

pub struct GolemState {
    pub owner: EntityId,
    pub health: ResourcePool,
    pub radius: f32,
    /// Per-instance phase offset for the roaming orbit.
    pub seed: u32,
    pub mode: GolemMode,
    pub attack: Cooldown,
}

impl GolemState {
    pub fn new(owner: EntityId, seed: u32, tuning: &GolemTuning, tick_rate_hz: u32) -> Self {
        Self {
            owner,
            health: ResourcePool::health(tuning.max_health),
            radius: tuning.radius,
            seed,
            mode: GolemMode::Roaming,
            attack: Cooldown::from_seconds(tuning.attack_rate, tick_rate_hz),
        }
    }
}

/// Mode for this tick given the nearest target and its distance.
pub fn next_mode(target: Option<(EntityId, f32)>, tuning: &GolemTuning) -> GolemMode {
    match target {
        Some((id, distance)) if distance <= tuning.attack_range => GolemMode::Attacking(id),
        Some((id, distance)) if distance <= tuning.aggro_range => GolemMode::Pursuing(id),
        _ => GolemMode::Roaming,
    }
}

/// Wandering orbit around the owner; the radius breathes between
/// `roam_radius - variance` and `roam_radius + variance`.
pub fn roam_point(owner: Vec3, seed: u32, now: f64, tuning: &GolemTuning) -> Vec3 {
    let time = (now * 0.5) as f32;
    let phase = (seed % 100) as f32;
    let radius = tuning.roam_radius + (time * 0.3 + phase).sin() * tuning.roam_radius_variance;
    let angle_speed = 0.5 + (seed % 10) as f32 / 20.0;
    let angle = time * angle_speed + phase;
    owner + Vec3::new(angle.sin() * radius, 0.0, angle.cos() * radius)
}

pub fn tick_golems(world: &mut World) {
    let tuning = world.tuning.golem;
    let now = world.now();
    let tick = world.tick();
    let dt = world.dt();

    let golems = world.ids_where(|e| matches!(e.kind, EntityKind::Golem(_)));
    for id in golems {
        let Some(entity) = world.get(id) else {
            continue;
        };
        let EntityKind::Golem(golem) = &entity.kind else {
            continue;
        };
        if golem.health.is_dead() {
            continue;
        }
        let position = entity.position;
        let (owner, seed) = (golem.owner, golem.seed);

        let target = world
            .nearest_target(position, tuning.aggro_range, Faction::Players, None)
            .and_then(|t| world.get(t))
            .map(|t| (t.id, t.position.distance(position)));
        let owner_position = world.get(owner).map(|o| o.position);
        let mode = next_mode(target, &tuning);

        let goal = match mode {
            GolemMode::Roaming => owner_position.map(|o| roam_point(o, seed, now, &tuning)),
            GolemMode::Pursuing(t) => world.get(t).map(|t| t.position),
            GolemMode::Attacking(_) => None,
        };

        let Some(entity) = world.get_mut(id) else {
            continue;
        };
        if let Some(goal) = goal {
            let mut direction = goal - entity.position;
            direction.y = 0.0;
            if direction.length() > tuning.arrive_distance {
                let step = direction.normalize() * tuning.speed * dt;
                entity.position += step;
                entity.yaw = step.x.atan2(step.z);
            }
        }

        let EntityKind::Golem(golem) = &mut entity.kind else {
            continue;
        };
        golem.mode = mode;
        if let GolemMode::Attacking(target) = mode {
            if golem.attack.is_ready(tick) {
                golem.attack.record(tick);
                world.commands.damage(id, target, tuning.attack_damage);
            }
        }
    }
}
