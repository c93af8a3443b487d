use super::types::{GameEvent, ServerState, WorldUpdate};
use crate::domain::systems::{
    abilities, boss, dragon, golem, projectiles, run_scheduled, teleporter, tick_movement, vitals,
};
use crate::domain::{FlatGround, Terrain, Tuning, World, WorldError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tracing::{debug, info};

/// Outcome of one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Tick that was just simulated.
    pub tick: u64,
    pub boss_defeated: bool,
}

/// Authoritative match state plus the events queued for the next step.
pub struct Simulation {
    world: World,
    pending: Vec<GameEvent>,
}

impl Simulation {
    /// Builds a match on the flat arena described by the tuning.
    pub fn new(tuning: Tuning, tick_rate_hz: u32) -> Result<Self, WorldError> {
        let arena = tuning.arena;
        let terrain = FlatGround::new(arena.ground_height, arena.half_extent_x, arena.half_extent_z);
        Self::with_terrain(tuning, Box::new(terrain), tick_rate_hz)
    }

    pub fn with_terrain(
        tuning: Tuning,
        terrain: Box<dyn Terrain>,
        tick_rate_hz: u32,
    ) -> Result<Self, WorldError> {
        Ok(Self {
            world: World::new(tuning, terrain, tick_rate_hz)?,
            pending: Vec::new(),
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    #[cfg(test)]
    pub(crate) fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.pending.push(event);
    }

    /// Advances the match by one tick. Phases run in a fixed order and each
    /// sees the results of the ones before it.
    pub fn step(&mut self) -> TickReport {
        let tick = self.world.tick();

        self.apply_events();
        run_scheduled(&mut self.world);

        tick_movement(&mut self.world);
        abilities::tick_casts(&mut self.world);

        boss::tick_boss(&mut self.world);
        golem::tick_golems(&mut self.world);
        dragon::tick_dragons(&mut self.world);

        projectiles::tick_projectiles(&mut self.world);
        vitals::tick_vitals(&mut self.world);
        teleporter::tick_teleporters(&mut self.world);

        self.world.advance_tick();
        TickReport {
            tick,
            boss_defeated: self.world.boss_defeated(),
        }
    }

    fn apply_events(&mut self) {
        for event in std::mem::take(&mut self.pending) {
            match event {
                GameEvent::Join { player_id } => {
                    self.world.add_player(player_id);
                    info!(player_id, "player joined");
                }
                GameEvent::Leave { player_id } => {
                    if self.world.remove_player(player_id) {
                        info!(player_id, "player left");
                    }
                }
                GameEvent::Input { player_id, input } => {
                    if !self.world.buffer_input(player_id, input) {
                        debug!(player_id, "input for unknown player dropped");
                    }
                }
                GameEvent::Cast { player_id, request } => {
                    if !self.world.queue_cast(player_id, request) {
                        debug!(player_id, "cast for unknown player dropped");
                    }
                }
                GameEvent::Respawn {
                    player_id,
                    position,
                } => {
                    if let Err(rejection) = self.world.request_respawn(player_id, position) {
                        debug!(player_id, ?rejection, "respawn rejected");
                    }
                }
            }
        }
    }

    pub fn snapshot(&self) -> WorldUpdate {
        let world = &self.world;
        WorldUpdate {
            tick: world.tick(),
            time: world.now(),
            players: world.player_snapshots(),
            boss: world.boss_snapshot(),
            golems: world.golem_snapshots(),
            dragons: world.dragon_snapshots(),
            projectiles: world.projectile_snapshots(),
            teleporters: world.teleporter_snapshots(),
        }
    }
}

/// Timing for a lobby's world loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub tick_rate_hz: u32,
    /// Broadcast a snapshot every N ticks.
    pub replication_interval_ticks: u32,
    /// Delay between lobby creation and the first tick.
    pub match_countdown: Duration,
}

impl LoopSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    world_tx: broadcast::Sender<WorldUpdate>,
    server_state_tx: watch::Sender<ServerState>,
    settings: LoopSettings,
    mut simulation: Simulation,
    shutdown: Arc<Notify>,
) {
    if !settings.match_countdown.is_zero() {
        let in_seconds = settings.match_countdown.as_secs_f64().ceil() as u32;
        let _ = server_state_tx.send(ServerState::MatchStarting { in_seconds });
        tokio::select! {
            _ = shutdown.notified() => return,
            _ = tokio::time::sleep(settings.match_countdown) => {}
        }
    }
    let _ = server_state_tx.send(ServerState::MatchRunning);

    // Drive the fixed-step game loop at the configured tick rate.
    let mut interval = tokio::time::interval(settings.tick_interval());
    let replication = u64::from(settings.replication_interval_ticks.max(1));
    let mut match_ended = false;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                // Exit cleanly when the lobby is removed.
                break;
            }
            _ = interval.tick() => {}
        }

        while let Ok(ev) = input_rx.try_recv() {
            simulation.push_event(ev);
        }

        let report = simulation.step();
        if report.boss_defeated && !match_ended {
            info!(tick = report.tick, "boss defeated; match ended");
            let _ = server_state_tx.send(ServerState::MatchEnded);
            match_ended = true;
        }

        if (report.tick + 1) % replication == 0 {
            // No subscribers is fine; the lobby may be empty.
            let _ = world_tx.send(simulation.snapshot());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::EntityId;
    use crate::domain::{PlayerInput, ProjectileKind};
    use glam::{Vec2, Vec3};

    fn simulation() -> Simulation {
        Simulation::new(Tuning::standard(), 10).expect("standard tuning builds a simulation")
    }

    fn joined(player_id: u64) -> Simulation {
        let mut sim = simulation();
        sim.push_event(GameEvent::Join { player_id });
        sim.step();
        sim
    }

    #[test]
    fn when_player_joins_then_the_next_snapshot_contains_them_and_their_dragon() {
        let sim = joined(1);

        let update = sim.snapshot();
        assert_eq!(update.tick, 1);
        assert_eq!(update.players.len(), 1);
        assert_eq!(update.players[0].player_id, 1);
        assert_eq!(update.dragons.len(), 1);
        assert!(update.boss.is_some());
    }

    #[test]
    fn when_jump_is_pressed_then_player_leaves_the_ground() {
        let mut sim = joined(1);

        sim.push_event(GameEvent::Input {
            player_id: 1,
            input: PlayerInput {
                jump: true,
                ..Default::default()
            },
        });
        sim.step();
        sim.step();

        let player = &sim.snapshot().players[0];
        assert_eq!(player.jump_count, 1);
        assert!(player.position.y > 0.0);
    }

    #[test]
    fn when_cast_button_is_pressed_then_a_fireball_is_spawned_once() {
        let mut sim = joined(1);
        let press = PlayerInput {
            cast_slot_1: true,
            move_dir: Vec2::ZERO,
            ..Default::default()
        };

        // Holding the button across ticks is a single press.
        for _ in 0..3 {
            sim.push_event(GameEvent::Input {
                player_id: 1,
                input: press,
            });
            sim.step();
        }

        let update = sim.snapshot();
        let fireballs = update
            .projectiles
            .iter()
            .filter(|p| p.kind == ProjectileKind::Fireball)
            .count();
        assert_eq!(fireballs, 1);
        assert!(update.players[0].mana < 250.0);
        assert!(update.players[0].fireball_cast_tick.is_some());
    }

    #[test]
    fn when_a_tick_has_no_input_then_movement_holds_and_nothing_is_pressed_again() {
        let mut sim = joined(1);
        let held = PlayerInput {
            move_dir: Vec2::new(0.0, 1.0),
            jump: true,
            cast_slot_2: true,
            ..Default::default()
        };

        sim.push_event(GameEvent::Input {
            player_id: 1,
            input: held,
        });
        sim.step();
        let pressed = sim.snapshot().players[0].clone();
        assert_eq!(pressed.jump_count, 1);
        assert!(pressed.mana <= 200.5);

        // Nothing delivered for this tick.
        sim.step();
        let gap = sim.snapshot().players[0].clone();
        assert!(gap.position.z > pressed.position.z);
        assert_eq!(gap.jump_count, 1);

        // The same buttons, still held, arrive again.
        sim.push_event(GameEvent::Input {
            player_id: 1,
            input: held,
        });
        sim.step();
        let resumed = sim.snapshot().players[0].clone();
        assert!(resumed.position.z > gap.position.z);
        assert_eq!(resumed.jump_count, 1);
        assert!(resumed.mana > pressed.mana);
        assert_eq!(sim.snapshot().golems.len(), 3);
    }

    #[test]
    fn when_player_leaves_then_their_entities_disappear() {
        let mut sim = joined(1);

        sim.push_event(GameEvent::Leave { player_id: 1 });
        sim.step();

        let update = sim.snapshot();
        assert!(update.players.is_empty());
        assert!(update.dragons.is_empty());
    }

    #[test]
    fn when_alive_player_requests_respawn_then_nothing_moves() {
        let mut sim = joined(1);

        sim.push_event(GameEvent::Respawn {
            player_id: 1,
            position: Vec3::new(50.0, 0.0, 50.0),
        });
        sim.step();

        let player = &sim.snapshot().players[0];
        assert!(player.position.x.abs() < 1.0);
    }

    #[test]
    fn when_boss_dies_then_report_flags_the_match_as_won() {
        let mut sim = joined(1);
        let boss = sim.snapshot().boss.map(|b| EntityId(b.id)).expect("boss");
        let player = sim.world().player_entity(1).expect("player");

        sim.world_mut().commands.damage(player, boss, 10_000.0);
        let report = sim.step();

        assert!(report.boss_defeated);
        assert!(sim.snapshot().boss.is_none());
    }

    #[tokio::test]
    async fn world_task_broadcasts_snapshots_and_stops_on_shutdown() {
        let (input_tx, input_rx) = mpsc::channel(16);
        let (world_tx, mut world_rx) = broadcast::channel(64);
        let (server_state_tx, server_state_rx) = watch::channel(ServerState::Lobby);
        let shutdown = Arc::new(Notify::new());
        let settings = LoopSettings {
            tick_rate_hz: 100,
            replication_interval_ticks: 2,
            match_countdown: Duration::ZERO,
        };

        let task = tokio::spawn(world_task(
            input_rx,
            world_tx,
            server_state_tx,
            settings,
            simulation(),
            shutdown.clone(),
        ));
        input_tx
            .send(GameEvent::Join { player_id: 9 })
            .await
            .expect("world task accepts events");

        let update = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match world_rx.recv().await {
                    Ok(update) if !update.players.is_empty() => return update,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("world task stopped"),
                }
            }
        })
        .await
        .expect("snapshot with the joined player");

        assert_eq!(update.players[0].player_id, 9);
        assert_eq!(update.tick % 2, 0);
        assert_eq!(*server_state_rx.borrow(), ServerState::MatchRunning);

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("world task exits on shutdown")
            .expect("world task does not panic");
    }
}
