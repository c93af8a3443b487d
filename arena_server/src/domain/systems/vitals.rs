// Resource phase: queued damage is applied in order, deaths are resolved and
// mana regenerates.

use crate::domain::resources::DamageOutcome;
use crate::domain::state::EntityKind;
use crate::domain::world::World;
use tracing::{debug, info};

pub fn tick_vitals(world: &mut World) {
    apply_damage(world);
    regenerate(world);
}

fn apply_damage(world: &mut World) {
    for event in world.commands.take_damage() {
        let Some(entity) = world.get_mut(event.target) else {
            continue;
        };
        match &mut entity.kind {
            EntityKind::Player(player) => match player.health.apply_damage(event.amount) {
                DamageOutcome::Died => {
                    info!(player_id = player.player_id, source = event.source.0, "player died");
                }
                DamageOutcome::Damaged => {
                    debug!(
                        player_id = player.player_id,
                        health = player.health.current(),
                        "player damaged"
                    );
                }
                DamageOutcome::Ignored => {}
            },
            EntityKind::Boss(boss) => {
                if boss.health.apply_damage(event.amount) == DamageOutcome::Died {
                    info!(boss_id = event.target.0, "boss defeated");
                    world.commands.despawn(event.target);
                    world.mark_boss_defeated();
                }
            }
            EntityKind::Golem(golem) => {
                if golem.health.apply_damage(event.amount) == DamageOutcome::Died {
                    debug!(golem_id = event.target.0, "golem destroyed");
                    world.commands.despawn(event.target);
                }
            }
            _ => {}
        }
    }
    world.flush_commands();
}

fn regenerate(world: &mut World) {
    let rate = world.tuning.player.mana_regen;
    let dt = world.dt();
    let players = world.ids_where(|e| e.as_player().is_some());
    for id in players {
        if let Some(player) = world.get_mut(id).and_then(|e| e.as_player_mut()) {
            if !player.health.is_dead() {
                player.mana.regenerate(rate, dt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::EntityId;
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

    #[test]
    fn when_boss_health_reaches_zero_then_it_is_removed() {
        let mut world = world();
        let boss = world.boss_snapshot().map(|b| EntityId(b.id)).expect("boss");
        let player = world.add_player(1);

        for _ in 0..10 {
            world.commands.damage(player, boss, 10.0);
        }
        tick_vitals(&mut world);

        assert!(world.boss_snapshot().is_none());
        assert!(world.boss_defeated());
    }

    #[test]
    fn damage_to_a_dead_player_is_ignored() {
        let mut world = world();
        let boss = world.boss_snapshot().map(|b| EntityId(b.id)).expect("boss");
        let player = world.add_player(1);

        world.commands.damage(boss, player, 150.0);
        world.commands.damage(boss, player, 10.0);
        tick_vitals(&mut world);

        let snapshot = &world.player_snapshots()[0];
        assert!(snapshot.is_dead);
        assert_eq!(snapshot.health, 0.0);
    }

    #[test]
    fn mana_regenerates_only_while_alive() {
        let mut world = world();
        world.add_player(1);
        if let Some(p) = world.player_mut(1) {
            p.mana.apply_damage(100.0);
        }

        for _ in 0..10 {
            tick_vitals(&mut world);
        }
        let regenerated = world.player(1).map(|p| p.mana.current()).unwrap_or_default();
        assert!((regenerated - 152.0).abs() < 1e-3);

        if let Some(p) = world.player_mut(1) {
            p.health.apply_damage(500.0);
        }
        tick_vitals(&mut world);
        let frozen = world.player(1).map(|p| p.mana.current()).unwrap_or_default();
        assert_eq!(frozen, regenerated);
    }
}
