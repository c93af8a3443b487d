// Boss AI: three independently timed abilities aimed at the nearest player.
// Several may fire in the same tick.

use crate::domain::state::{BossState, EntityId, EntityKind, Faction};
use crate::domain::systems::abilities::{
    FireballSpawn, choose_targets, cone_spike_positions, fireball_cone_directions, ground_below,
    spawn_fireball, spawn_ice_spike,
};
use crate::domain::systems::projectiles::SpikeOrigin;
use crate::domain::world::World;
use glam::Vec3;
use tracing::debug;

fn boss_mut(world: &mut World, id: EntityId) -> Option<&mut BossState> {
    match &mut world.get_mut(id)?.kind {
        EntityKind::Boss(boss) => Some(boss),
        _ => None,
    }
}

/// Horizontal unit vector for a yaw in radians.
pub fn facing(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

pub fn tick_boss(world: &mut World) {
    let tuning = world.tuning.boss;
    let tick = world.tick();

    let Some(id) = world
        .ids_where(|e| matches!(e.kind, EntityKind::Boss(_)))
        .first()
        .copied()
    else {
        return;
    };
    let Some(entity) = world.get(id) else {
        return;
    };
    let EntityKind::Boss(boss) = &entity.kind else {
        return;
    };
    if boss.health.is_dead() {
        return;
    }
    let (position, yaw) = (entity.position, entity.yaw);
    let fireball_ready = boss.fireball.is_ready(tick);
    let ice_ready = boss.ice_spikes.is_ready(tick);
    let cone_ready = boss.cone_spikes.is_ready(tick);

    // Without a target the boss keeps casting along its current facing.
    let target = world
        .nearest_matching(position, tuning.scan_radius, |e| e.as_player().is_some())
        .and_then(|t| world.get(t))
        .map(|t| t.position);
    let aim = target
        .map(|t| Vec3::new(t.x - position.x, 0.0, t.z - position.z))
        .and_then(|d| d.try_normalize())
        .unwrap_or_else(|| facing(yaw));
    if let Some(entity) = world.get_mut(id) {
        entity.yaw = aim.x.atan2(aim.z);
    }

    if fireball_ready {
        if let Some(boss) = boss_mut(world, id) {
            boss.fireball.record(tick);
        }
        let origin = position + Vec3::Y * tuning.radius + aim * tuning.radius;
        let directions =
            fireball_cone_directions(aim, tuning.fireball_count, tuning.fireball_cone_angle);
        for direction in &directions {
            spawn_fireball(
                world,
                FireballSpawn {
                    owner: id,
                    faction: Faction::Boss,
                    origin,
                    direction: *direction,
                    speed: Some(tuning.fireball_speed),
                    scale: Some(tuning.fireball_scale),
                },
            );
        }
        debug!(boss_id = id.0, count = directions.len(), "boss fireball volley");
    }

    if ice_ready {
        let candidates = world.players_in_range(position, tuning.scan_radius);
        // Nobody to target: try again next tick without spending the cooldown.
        if !candidates.is_empty() {
            if let Some(boss) = boss_mut(world, id) {
                boss.ice_spikes.record(tick);
            }
            let picked = choose_targets(
                &candidates,
                tuning.ice_spike_max_targets as usize,
                &mut world.rng,
            );
            let search = world.tuning.ice_spike.ground_search_distance;
            for target in &picked {
                let Some(at) = world.get(*target).map(|e| e.position) else {
                    continue;
                };
                let ground = ground_below(world.terrain(), at, search);
                spawn_ice_spike(world, id, SpikeOrigin::Targeted, ground);
            }
            debug!(boss_id = id.0, targets = picked.len(), "boss ice spikes");
        }
    }

    if cone_ready {
        if let Some(boss) = boss_mut(world, id) {
            boss.cone_spikes.record(tick);
        }
        let search = world.tuning.ice_spike.ground_search_distance;
        let positions = cone_spike_positions(
            position,
            aim,
            tuning.cone_spike_rows,
            tuning.cone_spike_row_spacing,
            tuning.cone_spike_half_angle,
            tuning.cone_spike_spacing,
        );
        for at in &positions {
            let ground = ground_below(world.terrain(), *at, search);
            spawn_ice_spike(world, id, SpikeOrigin::Cone, ground);
        }
        debug!(boss_id = id.0, spikes = positions.len(), "boss cone spikes");
    }

    world.flush_commands();
}
