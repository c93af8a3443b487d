// Simulation registry: owns every entity, the clock, the scheduler and the RNG.
// Lives only inside the lobby's world task, which makes it the single state
// authority for the match.

use crate::domain::cooldown::Cooldown;
use crate::domain::errors::{RespawnRejection, WorldError};
use crate::domain::resources::ResourcePool;
use crate::domain::scheduler::{self, Scheduler};
use crate::domain::state::{
    BossSnapshot, BossState, DragonSnapshot, Entity, EntityId, EntityKind, Faction,
    GolemSnapshot, PlayerInput, PlayerSnapshot, PlayerState, ProjectileKind, ProjectileSnapshot,
    TeleporterSnapshot,
};
use crate::domain::systems::abilities::{AbilitySlot, CastRequest, Spellbook};
use crate::domain::systems::dragon::DragonState;
use crate::domain::systems::movement::MovementContext;
use crate::domain::systems::projectiles::SpikeOrigin;
use crate::domain::systems::teleporter::TeleporterZone;
use crate::domain::terrain::Terrain;
use crate::domain::tuning::{BossTuning, Tuning};
use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::collections::BTreeMap;
use tracing::info;

/// Delayed actions run by the scheduler at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledEvent {
    ResetJumpCount(EntityId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageEvent {
    pub source: EntityId,
    pub target: EntityId,
    pub amount: f32,
}

/// Structural changes queued during a phase and applied at its end.
#[derive(Default)]
pub struct Commands {
    spawns: Vec<Entity>,
    despawns: Vec<EntityId>,
    damage: Vec<DamageEvent>,
}

impl Commands {
    pub fn spawn(&mut self, entity: Entity) {
        self.spawns.push(entity);
    }

    pub fn despawn(&mut self, id: EntityId) {
        if !self.despawns.contains(&id) {
            self.despawns.push(id);
        }
    }

    pub fn damage(&mut self, source: EntityId, target: EntityId, amount: f32) {
        self.damage.push(DamageEvent {
            source,
            target,
            amount,
        });
    }

    pub fn take_damage(&mut self) -> Vec<DamageEvent> {
        std::mem::take(&mut self.damage)
    }

    pub fn is_despawning(&self, id: EntityId) -> bool {
        self.despawns.contains(&id)
    }
}

pub struct World {
    pub(crate) tuning: Tuning,
    pub(crate) terrain: Box<dyn Terrain>,
    pub(crate) scheduler: Scheduler<ScheduledEvent>,
    pub(crate) rng: SmallRng,
    pub(crate) commands: Commands,
    tick_rate_hz: u32,
    tick: u64,
    next_id: u64,
    entities: BTreeMap<EntityId, Entity>,
    players: BTreeMap<u64, EntityId>,
    boss_defeated: bool,
}

impl World {
    /// Builds the arena: validates tuning, then spawns the boss and the
    /// teleporter zones.
    pub fn new(
        tuning: Tuning,
        terrain: Box<dyn Terrain>,
        tick_rate_hz: u32,
    ) -> Result<Self, WorldError> {
        if tick_rate_hz == 0 {
            return Err(WorldError::InvalidTickRate);
        }
        tuning.validate()?;

        let rng = SmallRng::seed_from_u64(tuning.arena.seed);
        let mut world = Self {
            tuning,
            terrain,
            scheduler: Scheduler::new(),
            rng,
            commands: Commands::default(),
            tick_rate_hz,
            tick: 0,
            next_id: 1,
            entities: BTreeMap::new(),
            players: BTreeMap::new(),
            boss_defeated: false,
        };

        let boss = new_boss(&world.tuning.boss, world.tick, tick_rate_hz);
        let boss_at = Vec3::from_array(world.tuning.boss.spawn_point);
        world.spawn(boss_at, std::f32::consts::PI, EntityKind::Boss(boss));

        let zones: Vec<_> = world.tuning.teleporters.clone();
        for zone in zones {
            let duration_ticks = world.seconds_to_ticks(zone.teleport_time);
            world.spawn(
                Vec3::from_array(zone.position),
                0.0,
                EntityKind::Teleporter(TeleporterZone::new(&zone, duration_ticks)),
            );
        }

        Ok(world)
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn terrain(&self) -> &dyn Terrain {
        self.terrain.as_ref()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.tick_rate_hz
    }

    /// Simulation time of the tick being processed, in seconds.
    pub fn now(&self) -> f64 {
        self.tick as f64 / f64::from(self.tick_rate_hz)
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate_hz as f32
    }

    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        scheduler::seconds_to_ticks(seconds, self.tick_rate_hz)
    }

    pub(crate) fn advance_tick(&mut self) {
        self.tick += 1;
    }

    pub fn boss_defeated(&self) -> bool {
        self.boss_defeated
    }

    pub(crate) fn mark_boss_defeated(&mut self) {
        self.boss_defeated = true;
    }

    /// Hands out a fresh id without inserting anything yet.
    pub fn reserve_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn spawn(&mut self, position: Vec3, yaw: f32, kind: EntityKind) -> EntityId {
        let id = self.reserve_id();
        self.entities.insert(
            id,
            Entity {
                id,
                position,
                yaw,
                kind,
            },
        );
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let EntityKind::Player(player) = &entity.kind {
            self.players.remove(&player.player_id);
        }
        Some(entity)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// All entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Ids matching `filter`, ascending. Systems collect ids first and then
    /// mutate one entity at a time.
    pub fn ids_where(&self, filter: impl Fn(&Entity) -> bool) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| filter(e))
            .map(|e| e.id)
            .collect()
    }

    /// Split borrow for systems that mutate one entity while reading tuning
    /// and terrain and scheduling timers.
    pub(crate) fn entity_with_env(
        &mut self,
        id: EntityId,
    ) -> Option<(
        &mut Entity,
        &Tuning,
        &dyn Terrain,
        &mut Scheduler<ScheduledEvent>,
    )> {
        let entity = self.entities.get_mut(&id)?;
        Some((
            entity,
            &self.tuning,
            self.terrain.as_ref(),
            &mut self.scheduler,
        ))
    }

    /// Applies queued despawns, then queued spawns.
    pub fn flush_commands(&mut self) {
        let despawns = std::mem::take(&mut self.commands.despawns);
        for id in despawns {
            self.despawn(id);
        }
        let spawns = std::mem::take(&mut self.commands.spawns);
        for entity in spawns {
            self.entities.insert(entity.id, entity);
        }
    }

    /// Living bodies whose sphere intersects the query sphere, ascending id.
    pub fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<EntityId> {
        self.entities
            .values()
            .filter_map(|e| {
                let body_radius = e.body_radius()?;
                let body = e.body_center()?;
                let reach = body_radius + radius;
                (body.distance_squared(center) <= reach * reach).then_some(e.id)
            })
            .collect()
    }

    /// Closest living body accepted by `filter` within `scan_radius`.
    /// Ties keep the lowest id.
    pub fn nearest_matching(
        &self,
        from: Vec3,
        scan_radius: f32,
        filter: impl Fn(&Entity) -> bool,
    ) -> Option<EntityId> {
        let mut best: Option<(EntityId, f32)> = None;
        for e in self.entities.values() {
            if !e.is_alive_body() || !filter(e) {
                continue;
            }
            let distance = e.position.distance(from);
            if distance > scan_radius {
                continue;
            }
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((e.id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Nearest living body hostile to `seeker`.
    pub fn nearest_target(
        &self,
        from: Vec3,
        scan_radius: f32,
        seeker: Faction,
        exclude: Option<EntityId>,
    ) -> Option<EntityId> {
        self.nearest_matching(from, scan_radius, |e| {
            Some(e.id) != exclude && seeker.is_hostile_to(e.faction())
        })
    }

    /// Living player entities within `radius`, ascending id.
    pub fn players_in_range(&self, from: Vec3, radius: f32) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.as_player().is_some_and(|p| !p.health.is_dead()))
            .filter(|e| e.position.distance(from) <= radius)
            .map(|e| e.id)
            .collect()
    }

    pub fn player_entity(&self, player_id: u64) -> Option<EntityId> {
        self.players.get(&player_id).copied()
    }

    pub fn player(&self, player_id: u64) -> Option<&PlayerState> {
        let id = self.player_entity(player_id)?;
        self.get(id)?.as_player()
    }

    pub fn player_mut(&mut self, player_id: u64) -> Option<&mut PlayerState> {
        let id = self.player_entity(player_id)?;
        self.get_mut(id)?.as_player_mut()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Spawns a player at the spawn point together with their dragon pet.
    /// Joining twice returns the existing entity.
    pub fn add_player(&mut self, player_id: u64) -> EntityId {
        if let Some(existing) = self.player_entity(player_id) {
            return existing;
        }

        let spawn = self
            .terrain
            .clamp_to_bounds(Vec3::from_array(self.tuning.player.spawn_point));
        let player = PlayerState {
            player_id,
            health: ResourcePool::health(self.tuning.player.max_health),
            mana: ResourcePool::mana(self.tuning.player.max_mana),
            movement: MovementContext::new(&self.tuning.player),
            spellbook: Spellbook::new(&self.tuning, self.tick_rate_hz),
            pending_input: None,
            pending_casts: Vec::new(),
            golems: Vec::new(),
            dragon: None,
        };
        let entity = self.spawn(spawn, 0.0, EntityKind::Player(Box::new(player)));
        self.players.insert(player_id, entity);

        let dragon_tuning = self.tuning.dragon;
        let dragon_at = spawn + Vec3::Y * dragon_tuning.flight_height;
        let dragon = self.spawn(
            dragon_at,
            0.0,
            EntityKind::Dragon(DragonState::new(entity, &dragon_tuning, self.tick_rate_hz)),
        );
        if let Some(p) = self.get_mut(entity).and_then(Entity::as_player_mut) {
            p.dragon = Some(dragon);
        }

        info!(player_id, entity = entity.0, "player spawned");
        entity
    }

    /// Removes a player along with everything they own (summons, in-flight
    /// projectiles, pending timers). Returns false for unknown players.
    pub fn remove_player(&mut self, player_id: u64) -> bool {
        let Some(entity_id) = self.player_entity(player_id) else {
            return false;
        };
        let Some(entity) = self.despawn(entity_id) else {
            return false;
        };

        if let EntityKind::Player(player) = entity.kind {
            if let Some(handle) = player.movement.pending_jump_reset {
                self.scheduler.cancel(handle);
            }
        }

        let owned = self.ids_where(|e| owner_of(e) == Some(entity_id));
        for id in owned {
            self.despawn(id);
        }
        true
    }

    /// Stores input for the next tick, merging with anything already buffered.
    pub fn buffer_input(&mut self, player_id: u64, input: PlayerInput) -> bool {
        match self.player_mut(player_id) {
            Some(player) => {
                player.pending_input = Some(match player.pending_input {
                    Some(buffered) => buffered.merge(input),
                    None => input,
                });
                true
            }
            None => false,
        }
    }

    pub fn queue_cast(&mut self, player_id: u64, request: CastRequest) -> bool {
        match self.player_mut(player_id) {
            Some(player) => {
                player.pending_casts.push(request);
                true
            }
            None => false,
        }
    }

    /// Brings a dead player back at `position` with full pools.
    pub fn request_respawn(
        &mut self,
        player_id: u64,
        position: Vec3,
    ) -> Result<(), RespawnRejection> {
        let entity_id = self
            .player_entity(player_id)
            .ok_or(RespawnRejection::UnknownPlayer)?;
        let target = self.terrain.clamp_to_bounds(position);
        let entity = self
            .entities
            .get_mut(&entity_id)
            .ok_or(RespawnRejection::UnknownPlayer)?;
        let player = entity
            .as_player_mut()
            .ok_or(RespawnRejection::UnknownPlayer)?;

        if !player.health.respawn() {
            return Err(RespawnRejection::NotDead);
        }
        player.mana.refill();
        if let Some(handle) = player.movement.reset() {
            self.scheduler.cancel(handle);
        }
        entity.position = target;

        info!(player_id, x = target.x, y = target.y, z = target.z, "player respawned");
        Ok(())
    }

    pub fn player_snapshots(&self) -> Vec<PlayerSnapshot> {
        self.entities
            .values()
            .filter_map(|e| {
                let p = e.as_player()?;
                Some(PlayerSnapshot {
                    id: e.id.0,
                    player_id: p.player_id,
                    position: e.position,
                    yaw: e.yaw,
                    health: p.health.current(),
                    max_health: p.health.max(),
                    mana: p.mana.current(),
                    max_mana: p.mana.max(),
                    is_dead: p.health.is_dead(),
                    animation: p.movement.animation,
                    jump_count: p.movement.jump_count,
                    fireball_cast_tick: p.spellbook.cooldown(AbilitySlot::Fireball).last_cast(),
                    summon_cast_tick: p
                        .spellbook
                        .cooldown(AbilitySlot::SummonGolems)
                        .last_cast(),
                })
            })
            .collect()
    }

    pub fn boss_snapshot(&self) -> Option<BossSnapshot> {
        self.entities.values().find_map(|e| match &e.kind {
            EntityKind::Boss(b) => Some(BossSnapshot {
                id: e.id.0,
                position: e.position,
                yaw: e.yaw,
                health: b.health.current(),
                max_health: b.health.max(),
            }),
            _ => None,
        })
    }

    pub fn golem_snapshots(&self) -> Vec<GolemSnapshot> {
        self.entities
            .values()
            .filter_map(|e| match &e.kind {
                EntityKind::Golem(g) => Some(GolemSnapshot {
                    id: e.id.0,
                    owner_id: g.owner.0,
                    position: e.position,
                    yaw: e.yaw,
                    health: g.health.current(),
                    mode: g.mode.label(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn dragon_snapshots(&self) -> Vec<DragonSnapshot> {
        self.entities
            .values()
            .filter_map(|e| match &e.kind {
                EntityKind::Dragon(d) => Some(DragonSnapshot {
                    id: e.id.0,
                    owner_id: d.owner.0,
                    position: e.position,
                    yaw: e.yaw,
                    mode: d.mode.label(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn projectile_snapshots(&self) -> Vec<ProjectileSnapshot> {
        let now = self.now();
        self.entities
            .values()
            .filter_map(|e| match &e.kind {
                EntityKind::Fireball(p) => Some(ProjectileSnapshot {
                    id: e.id.0,
                    owner_id: p.owner.0,
                    kind: ProjectileKind::Fireball,
                    position: e.position,
                    direction: p.direction,
                    scale: p.scale,
                    height_ratio: 1.0,
                }),
                EntityKind::IceSpike(s) => Some(ProjectileSnapshot {
                    id: e.id.0,
                    owner_id: s.owner.0,
                    kind: match s.origin {
                        SpikeOrigin::Targeted => ProjectileKind::IceSpike,
                        SpikeOrigin::Cone => ProjectileKind::ConeIceSpike,
                    },
                    position: e.position,
                    direction: Vec3::Y,
                    scale: 1.0,
                    height_ratio: s.height_ratio(now),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn teleporter_snapshots(&self) -> Vec<TeleporterSnapshot> {
        let tick = self.tick;
        let rate = f64::from(self.tick_rate_hz);
        self.entities
            .values()
            .filter_map(|e| match &e.kind {
                EntityKind::Teleporter(z) => Some(TeleporterSnapshot {
                    id: e.id.0,
                    position: e.position,
                    radius: z.radius,
                    occupants: z.occupants.len() as u32,
                    remaining_seconds: z
                        .timer
                        .map(|t| t.remaining_ticks(tick) as f64 / rate),
                }),
                _ => None,
            })
            .collect()
    }
}

fn new_boss(tuning: &BossTuning, tick: u64, tick_rate_hz: u32) -> BossState {
    // Abilities start on cooldown so the boss idles for one interval first.
    let started = |seconds: f64| {
        Cooldown::started_at(scheduler::seconds_to_ticks(seconds, tick_rate_hz), tick)
    };
    BossState {
        health: ResourcePool::health(tuning.max_health),
        radius: tuning.radius,
        fireball: started(tuning.fireball_interval),
        ice_spikes: started(tuning.ice_spike_interval),
        cone_spikes: started(tuning.cone_spike_interval),
    }
}

/// Owning entity of summons and projectiles.
pub fn owner_of(entity: &Entity) -> Option<EntityId> {
    match &entity.kind {
        EntityKind::Golem(g) => Some(g.owner),
        EntityKind::Dragon(d) => Some(d.owner),
        EntityKind::Fireball(p) => Some(p.owner),
        EntityKind::IceSpike(s) => Some(s.owner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::terrain::FlatGround;

    fn world() -> World {
        World::new(
            Tuning::standard(),
            Box::new(FlatGround::new(0.0, 100.0, 100.0)),
            10,
        )
        .expect("standard tuning builds a world")
    }

    fn place(world: &mut World, id: EntityId, position: Vec3) {
        if let Some(entity) = world.get_mut(id) {
            entity.position = position;
        }
    }

    #[test]
    fn when_tick_rate_is_zero_then_world_is_rejected() {
        let result = World::new(
            Tuning::standard(),
            Box::new(FlatGround::new(0.0, 100.0, 100.0)),
            0,
        );

        assert!(matches!(result, Err(WorldError::InvalidTickRate)));
    }

    #[test]
    fn new_world_contains_boss_and_teleporter() {
        let world = world();

        assert!(world.boss_snapshot().is_some());
        assert_eq!(world.teleporter_snapshots().len(), 1);
        assert_eq!(world.player_count(), 0);
    }

    #[test]
    fn when_player_joins_then_a_dragon_follows_them() {
        let mut world = world();

        let entity = world.add_player(7);

        let dragons = world.dragon_snapshots();
        assert_eq!(dragons.len(), 1);
        assert_eq!(dragons[0].owner_id, entity.0);
        assert_eq!(world.add_player(7), entity);
    }

    #[test]
    fn when_player_leaves_then_owned_entities_are_removed() {
        let mut world = world();
        world.add_player(7);

        assert!(world.remove_player(7));

        assert!(world.dragon_snapshots().is_empty());
        assert!(world.player_snapshots().is_empty());
        assert!(!world.remove_player(7));
    }

    #[test]
    fn despawned_ids_resolve_to_nothing_and_are_not_reused() {
        let mut world = world();
        let first = world.add_player(1);
        world.remove_player(1);

        let second = world.add_player(1);

        assert!(world.get(first).is_none());
        assert!(second > first);
    }

    #[test]
    fn nearest_target_prefers_lowest_id_on_ties() {
        let mut world = world();
        let a = world.add_player(1);
        let b = world.add_player(2);
        place(&mut world, a, Vec3::new(3.0, 0.0, 0.0));
        place(&mut world, b, Vec3::new(-3.0, 0.0, 0.0));

        let nearest = world.nearest_target(Vec3::ZERO, 10.0, Faction::Boss, None);

        assert_eq!(nearest, Some(a));
    }

    #[test]
    fn when_player_is_alive_then_respawn_is_rejected() {
        let mut world = world();
        world.add_player(1);

        assert_eq!(
            world.request_respawn(1, Vec3::ZERO),
            Err(RespawnRejection::NotDead)
        );
        assert_eq!(
            world.request_respawn(99, Vec3::ZERO),
            Err(RespawnRejection::UnknownPlayer)
        );
    }

    #[test]
    fn buffered_inputs_within_a_tick_keep_presses() {
        let mut world = world();
        world.add_player(1);
        let press = PlayerInput {
            jump: true,
            ..Default::default()
        };
        let release = PlayerInput {
            camera_yaw: 90.0,
            ..Default::default()
        };

        world.buffer_input(1, press);
        world.buffer_input(1, release);

        let buffered = world.player(1).and_then(|p| p.pending_input).unwrap_or_default();
        assert!(buffered.jump);
        assert_eq!(buffered.camera_yaw, 90.0);
    }
}
