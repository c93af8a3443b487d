// Teleporter zones: once living players have stood inside continuously for
// the configured time, everyone inside is moved to the destination. The timer
// resets whenever the zone empties.

use crate::domain::scheduler::TickTimer;
use crate::domain::state::{EntityId, EntityKind};
use crate::domain::tuning::TeleporterTuning;
use crate::domain::world::World;
use glam::Vec3;
use std::collections::BTreeSet;
use tracing::{debug, info};

pub struct TeleporterZone {
    pub radius: f32,
    pub destination: Vec3,
    pub duration_ticks: u64,
    pub occupants: BTreeSet<EntityId>,
    /// Running iff `occupants` is non-empty.
    pub timer: Option<TickTimer>,
}

impl TeleporterZone {
    pub fn new(tuning: &TeleporterTuning, duration_ticks: u64) -> Self {
        Self {
            radius: tuning.radius,
            destination: Vec3::from_array(tuning.destination),
            duration_ticks,
            occupants: BTreeSet::new(),
            timer: None,
        }
    }
}

pub fn tick_teleporters(world: &mut World) {
    let tick = world.tick();
    let zones = world.ids_where(|e| matches!(e.kind, EntityKind::Teleporter(_)));

    for id in zones {
        let Some(entity) = world.get(id) else {
            continue;
        };
        let EntityKind::Teleporter(zone) = &entity.kind else {
            continue;
        };
        let occupants: BTreeSet<EntityId> = world
            .overlap_sphere(entity.position, zone.radius)
            .into_iter()
            .filter(|o| world.get(*o).is_some_and(|e| e.as_player().is_some()))
            .collect();

        let Some(entity) = world.get_mut(id) else {
            continue;
        };
        let EntityKind::Teleporter(zone) = &mut entity.kind else {
            continue;
        };

        if occupants.is_empty() {
            if zone.timer.take().is_some() {
                debug!(zone_id = id.0, "teleporter zone empty, timer reset");
            }
            zone.occupants.clear();
            continue;
        }

        zone.occupants = occupants;
        let Some(timer) = zone.timer else {
            zone.timer = Some(TickTimer::from_ticks(tick, zone.duration_ticks));
            debug!(zone_id = id.0, "teleporter timer started");
            continue;
        };
        if !timer.expired(tick) {
            continue;
        }

        let destination = zone.destination;
        let moved = std::mem::take(&mut zone.occupants);
        zone.timer = None;
        for player in &moved {
            if let Some(entity) = world.get_mut(*player) {
                entity.position = destination;
                if let Some(p) = entity.as_player_mut() {
                    p.movement.current_movement = Vec3::ZERO;
                    p.movement.applied_movement = Vec3::ZERO;
                }
            }
        }
        info!(zone_id = id.0, players = moved.len(), "teleported players");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::terrain::FlatGround;
    use crate::domain::tuning::Tuning;

    const INSIDE: Vec3 = Vec3::new(-20.0, 0.0, 0.0);
    const OUTSIDE: Vec3 = Vec3::new(-40.0, 0.0, 0.0);
    const DESTINATION: Vec3 = Vec3::new(0.0, 0.0, 120.0);

    fn world() -> World {
        World::new(
            Tuning::standard(),
            Box::new(FlatGround::new(0.0, 200.0, 200.0)),
            10,
        )
        .expect("standard tuning builds a world")
    }

    fn place(world: &mut World, id: EntityId, position: Vec3) {
        if let Some(entity) = world.get_mut(id) {
            entity.position = position;
        }
    }

    fn position(world: &World, id: EntityId) -> Vec3 {
        world.get(id).map(|e| e.position).unwrap_or(Vec3::NAN)
    }

    #[test]
    fn when_player_stays_for_the_full_time_then_they_are_teleported() {
        let mut world = world();
        let player = world.add_player(1);
        place(&mut world, player, INSIDE);

        for _ in 0..50 {
            tick_teleporters(&mut world);
            world.advance_tick();
        }
        assert_eq!(position(&world, player), INSIDE);

        tick_teleporters(&mut world);
        assert_eq!(position(&world, player), DESTINATION);
        assert_eq!(world.teleporter_snapshots()[0].occupants, 0);
        assert_eq!(world.teleporter_snapshots()[0].remaining_seconds, None);
    }

    #[test]
    fn when_zone_empties_then_the_timer_starts_over() {
        let mut world = world();
        let player = world.add_player(1);
        place(&mut world, player, INSIDE);

        // Inside from t=0, leaves at t=3.0, back at t=3.1.
        while world.tick() <= 81 {
            match world.tick() {
                30 => place(&mut world, player, OUTSIDE),
                31 => place(&mut world, player, INSIDE),
                _ => {}
            }
            tick_teleporters(&mut world);
            let teleported = position(&world, player) == DESTINATION;
            assert_eq!(teleported, world.tick() == 81, "tick {}", world.tick());
            if teleported {
                break;
            }
            world.advance_tick();
        }

        assert_eq!(position(&world, player), DESTINATION);
    }

    #[test]
    fn dead_players_do_not_hold_the_zone() {
        let mut world = world();
        let player = world.add_player(1);
        place(&mut world, player, INSIDE);
        if let Some(p) = world.player_mut(1) {
            p.health.apply_damage(1000.0);
        }

        tick_teleporters(&mut world);

        let zone = &world.teleporter_snapshots()[0];
        assert_eq!(zone.occupants, 0);
        assert_eq!(zone.remaining_seconds, None);
    }

    #[test]
    fn everyone_inside_moves_together() {
        let mut world = world();
        let first = world.add_player(1);
        let second = world.add_player(2);
        place(&mut world, first, INSIDE);

        for tick in 0..=50 {
            if tick == 20 {
                place(&mut world, second, INSIDE + Vec3::new(1.0, 0.0, 0.0));
            }
            tick_teleporters(&mut world);
            world.advance_tick();
        }

        assert_eq!(position(&world, first), DESTINATION);
        assert_eq!(position(&world, second), DESTINATION);
    }
}
