// Per-phase simulation systems. Each `tick_*` function runs one phase of the
// world step over every relevant entity in ascending id order.

pub mod abilities;
pub mod boss;
pub mod dragon;
pub mod golem;
pub mod movement;
pub mod projectiles;
pub mod teleporter;
pub mod vitals;

use crate::domain::state::{Entity, EntityKind, InputEdges};
use crate::domain::world::{ScheduledEvent, World};
use movement::MovementEnv;

/// Runs due scheduled actions (jump counter resets).
pub fn run_scheduled(world: &mut World) {
    let tick = world.tick();
    for (handle, event) in world.scheduler.drain_due(tick) {
        match event {
            ScheduledEvent::ResetJumpCount(entity) => {
                let player = world.get_mut(entity).and_then(Entity::as_player_mut);
                if let Some(player) = player {
                    if player.movement.pending_jump_reset == Some(handle) {
                        movement::reset_jump_count(&mut player.movement);
                    }
                }
            }
        }
    }
}

/// Movement phase: consumes each player's buffered input and advances the
/// movement state machine. Dead players only record their input.
pub fn tick_movement(world: &mut World) {
    let tick = world.tick();
    let dt = world.dt();
    let grace_ticks = world.seconds_to_ticks(f64::from(world.tuning.player.jump_reset_grace));
    let players = world.ids_where(|e| matches!(e.kind, EntityKind::Player(_)));

    for id in players {
        let Some((entity, tuning, terrain, scheduler)) = world.entity_with_env(id) else {
            continue;
        };
        let EntityKind::Player(player) = &mut entity.kind else {
            continue;
        };

        let input = player.pending_input.take();
        if player.health.is_dead() {
            player.movement.advance_input(input);
            player.movement.edges = InputEdges::default();
            continue;
        }

        let mut env = MovementEnv {
            tuning: &tuning.player,
            terrain,
            scheduler,
            tick,
            dt,
            reset_grace_ticks: grace_ticks,
        };
        let (position, yaw) = movement::tick_player(
            &mut player.movement,
            id,
            entity.position,
            entity.yaw,
            input,
            &mut env,
        );
        entity.position = position;
        entity.yaw = yaw;
    }
}
