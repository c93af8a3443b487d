// Dragon pet: hovers over its owner, periodically dives at the boss and then
// flies back.

use crate::domain::cooldown::Cooldown;
use crate::domain::state::{EntityId, EntityKind, Faction};
use crate::domain::tuning::DragonTuning;
use crate::domain::world::World;
use glam::Vec3;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragonMode {
    Following,
    Diving(EntityId),
    Returning,
}

impl DragonMode {
    pub fn label(&self) -> &'static str {
        match self {
            DragonMode::Following => "following",
            DragonMode::Diving(_) => "diving",
            DragonMode::Returning => "returning",
        }
    }
}

pub struct DragonState {
    pub owner: EntityId,
    pub mode: DragonMode,
    pub attack: Cooldown,
    pub dive_start: Vec3,
}

impl DragonState {
    pub fn new(owner: EntityId, tuning: &DragonTuning, tick_rate_hz: u32) -> Self {
        Self {
            owner,
            mode: DragonMode::Following,
            attack: Cooldown::from_seconds(tuning.attack_interval, tick_rate_hz),
            dive_start: Vec3::ZERO,
        }
    }
}

/// Point the dragon drifts towards while following: above the owner, circling
/// slowly and bobbing.
pub fn hover_point(owner: Vec3, now: f64, tuning: &DragonTuning) -> Vec3 {
    let time = now as f32;
    owner
        + Vec3::Y * tuning.flight_height
        + Vec3::new(
            (time * 0.5).sin() * tuning.orbit_distance,
            (time * 2.0).sin() * 0.5,
            (time * 0.5).cos() * tuning.orbit_distance,
        )
}

fn face(direction: Vec3, fallback: f32) -> f32 {
    if direction.x.abs() + direction.z.abs() > 1e-6 {
        direction.x.atan2(direction.z)
    } else {
        fallback
    }
}

pub fn tick_dragons(world: &mut World) {
    let tuning = world.tuning.dragon;
    let now = world.now();
    let tick = world.tick();
    let dt = world.dt();

    let dragons = world.ids_where(|e| matches!(e.kind, EntityKind::Dragon(_)));
    for id in dragons {
        let Some(entity) = world.get(id) else {
            continue;
        };
        let EntityKind::Dragon(dragon) = &entity.kind else {
            continue;
        };
        let position = entity.position;
        let (owner, mode, attack_ready) = (dragon.owner, dragon.mode, dragon.attack.is_ready(tick));
        let owner_position = world.get(owner).map(|o| o.position);

        match mode {
            DragonMode::Following => {
                let Some(owner_position) = owner_position else {
                    continue;
                };
                let target = world.nearest_target(position, tuning.aggro_range, Faction::Players, None);
                let Some(entity) = world.get_mut(id) else {
                    continue;
                };
                let EntityKind::Dragon(dragon) = &mut entity.kind else {
                    continue;
                };
                if let (Some(target), true) = (target, attack_ready) {
                    dragon.mode = DragonMode::Diving(target);
                    dragon.dive_start = position;
                    dragon.attack.record(tick);
                    debug!(dragon_id = id.0, target_id = target.0, "dragon dive started");
                    continue;
                }

                let hover = hover_point(owner_position, now, &tuning);
                let blend = (dt * tuning.position_smoothing / 2.0).clamp(0.0, 1.0);
                entity.position = position.lerp(hover, blend);
                entity.yaw = face(hover - entity.position, entity.yaw);
            }
            DragonMode::Diving(target) => {
                let target_position = world
                    .get(target)
                    .filter(|t| t.is_alive_body())
                    .map(|t| t.position);
                let Some(entity) = world.get_mut(id) else {
                    continue;
                };
                let EntityKind::Dragon(dragon) = &mut entity.kind else {
                    continue;
                };
                let Some(target_position) = target_position else {
                    dragon.mode = DragonMode::Returning;
                    continue;
                };

                let direction = (target_position - position).normalize_or_zero();
                entity.position = position + direction * tuning.dive_speed * dt;
                entity.yaw = face(direction, entity.yaw);
                if entity.position.distance(target_position) < tuning.impact_radius {
                    dragon.mode = DragonMode::Returning;
                    world.commands.damage(id, target, tuning.attack_damage);
                    debug!(dragon_id = id.0, target_id = target.0, "dragon dive hit");
                }
            }
            DragonMode::Returning => {
                let Some(entity) = world.get_mut(id) else {
                    continue;
                };
                let EntityKind::Dragon(dragon) = &mut entity.kind else {
                    continue;
                };
                match owner_position {
                    None => {
                        entity.position.y += tuning.return_speed * dt;
                        if entity.position.y > tuning.ownerless_ceiling {
                            dragon.mode = DragonMode::Following;
                        }
                    }
                    Some(owner_position) => {
                        let goal = owner_position + Vec3::Y * tuning.flight_height;
                        let direction = (goal - position).normalize_or_zero();
                        entity.position = position + direction * tuning.return_speed * dt;
                        entity.yaw = face(direction, entity.yaw);
                        if entity.position.distance(goal) < tuning.return_threshold {
                            dragon.mode = DragonMode::Following;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::terrain::FlatGround;
    use crate::domain::tuning::Tuning;

    fn world() -> World {
        World::new(
            Tuning::standard(),
            Box::new(FlatGround::new(0.0, 100.0, 100.0)),
            10,
        )
        .expect("standard tuning builds a world")
    }

    fn dragon_mode(world: &World) -> Option<DragonMode> {
        world.entities().find_map(|e| match &e.kind {
            EntityKind::Dragon(d) => Some(d.mode),
            _ => None,
        })
    }

    fn step(world: &mut World, ticks: usize) {
        for _ in 0..ticks {
            tick_dragons(world);
            world.advance_tick();
        }
    }

    #[test]
    fn when_boss_is_out_of_range_then_dragon_hovers_over_owner() {
        let mut world = world();
        world.add_player(1);

        step(&mut world, 50);

        assert_eq!(dragon_mode(&world), Some(DragonMode::Following));
        let dragon = world.dragon_snapshots()[0].position;
        assert!(dragon.y > 3.0 && dragon.y < 7.0);
        assert!(Vec3::new(dragon.x, 0.0, dragon.z).length() < 3.0);
    }

    #[test]
    fn dive_hits_once_then_returns_to_following() {
        let mut world = world();
        world.add_player(1);
        let boss = world.boss_snapshot().map(|b| EntityId(b.id)).expect("boss");
        if let Some(entity) = world.get_mut(boss) {
            entity.position = Vec3::new(0.0, 0.0, 10.0);
        }

        step(&mut world, 1);
        assert_eq!(dragon_mode(&world), Some(DragonMode::Diving(boss)));

        let mut hits = 0;
        for _ in 0..60 {
            step(&mut world, 1);
            hits += world
                .commands
                .take_damage()
                .iter()
                .filter(|d| d.target == boss && d.amount == 15.0)
                .count();
            if dragon_mode(&world) == Some(DragonMode::Following) {
                break;
            }
        }

        assert_eq!(hits, 1);
        assert_eq!(dragon_mode(&world), Some(DragonMode::Following));
    }

    #[test]
    fn when_owner_is_gone_then_returning_dragon_climbs() {
        let mut world = world();
        let owner = world.add_player(1);
        let dragon = world.dragon_snapshots()[0].id;
        if let Some(entity) = world.get_mut(EntityId(dragon)) {
            entity.position = Vec3::new(0.0, 1.0, 0.0);
            if let EntityKind::Dragon(d) = &mut entity.kind {
                d.mode = DragonMode::Returning;
            }
        }
        world.despawn(owner);

        step(&mut world, 5);
        assert_eq!(dragon_mode(&world), Some(DragonMode::Returning));
        step(&mut world, 10);

        assert_eq!(dragon_mode(&world), Some(DragonMode::Following));
        assert!(world.dragon_snapshots()[0].position.y > 10.0);
    }
}
