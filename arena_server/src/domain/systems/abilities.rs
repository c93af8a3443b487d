// Cast pipeline: validation shared with client prediction, authoritative
// execution, and the spawn layouts used by player and boss abilities.

use crate::domain::cooldown::Cooldown;
use crate::domain::errors::CastRejection;
use crate::domain::resources::{ResourcePool, Role};
use crate::domain::state::{Entity, EntityId, EntityKind, Faction};
use crate::domain::systems::golem::GolemState;
use crate::domain::systems::projectiles::{IceSpike, Projectile, SpikeOrigin};
use crate::domain::terrain::Terrain;
use crate::domain::tuning::{FireballTuning, MAX_SPAWNS_PER_CAST, Tuning};
use crate::domain::world::World;
use glam::{Quat, Vec3};
use rand::Rng;
use tracing::{debug, info};

// Golem placement casts down to the ground from this far above the candidate point.
const GOLEM_RAY_HEIGHT: f32 = 10.0;
const GOLEM_RAY_DISTANCE: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilitySlot {
    Fireball,
    SummonGolems,
}

impl AbilitySlot {
    /// Maps the 1-based action bar index.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(AbilitySlot::Fireball),
            2 => Some(AbilitySlot::SummonGolems),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            AbilitySlot::Fireball => 1,
            AbilitySlot::SummonGolems => 2,
        }
    }

    pub fn mana_cost(self, tuning: &Tuning) -> f32 {
        match self {
            AbilitySlot::Fireball => tuning.fireball.mana_cost,
            AbilitySlot::SummonGolems => tuning.golem_summon.mana_cost,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CastRequest {
    pub slot: AbilitySlot,
    pub spawn_position: Vec3,
    pub direction: Vec3,
}

impl CastRequest {
    /// Request aimed along the camera, spawning in front of and above the caster.
    pub fn from_camera(
        slot: AbilitySlot,
        caster: Vec3,
        camera_forward: Vec3,
        tuning: &FireballTuning,
    ) -> Self {
        Self {
            slot,
            spawn_position: default_spawn(caster, camera_forward, tuning),
            direction: camera_forward,
        }
    }

    /// Cleans up a client-aimed request: non-finite or zero directions fall
    /// back to the camera, and the spawn point may not stray from the caster.
    pub fn sanitized(
        self,
        caster: Vec3,
        camera_forward: Vec3,
        tuning: &FireballTuning,
    ) -> Self {
        let direction = if self.direction.is_finite() {
            self.direction.normalize_or(camera_forward)
        } else {
            camera_forward
        };
        let spawn_position = if self.spawn_position.is_finite() {
            caster + (self.spawn_position - caster).clamp_length_max(tuning.max_spawn_offset)
        } else {
            default_spawn(caster, direction, tuning)
        };
        Self {
            slot: self.slot,
            spawn_position,
            direction,
        }
    }
}

fn default_spawn(caster: Vec3, direction: Vec3, tuning: &FireballTuning) -> Vec3 {
    caster + direction * tuning.spawn_forward_offset + Vec3::Y * tuning.spawn_up_offset
}

/// Per-player cooldowns, one per action bar slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spellbook {
    fireball: Cooldown,
    summon_golems: Cooldown,
}

impl Spellbook {
    pub fn new(tuning: &Tuning, tick_rate_hz: u32) -> Self {
        Self {
            fireball: Cooldown::from_seconds(tuning.fireball.cooldown, tick_rate_hz),
            summon_golems: Cooldown::from_seconds(tuning.golem_summon.cooldown, tick_rate_hz),
        }
    }

    pub fn cooldown(&self, slot: AbilitySlot) -> &Cooldown {
        match slot {
            AbilitySlot::Fireball => &self.fireball,
            AbilitySlot::SummonGolems => &self.summon_golems,
        }
    }

    pub fn cooldown_mut(&mut self, slot: AbilitySlot) -> &mut Cooldown {
        match slot {
            AbilitySlot::Fireball => &mut self.fireball,
            AbilitySlot::SummonGolems => &mut self.summon_golems,
        }
    }
}

/// Gate shared by the server and client prediction. Checks run in a fixed
/// order: caster alive, cooldown, mana.
pub fn validate_cast(
    cooldown: &Cooldown,
    mana_cost: f32,
    mana: &ResourcePool,
    caster_dead: bool,
    tick: u64,
    tick_rate_hz: u32,
) -> Result<(), CastRejection> {
    if caster_dead {
        return Err(CastRejection::CasterDead);
    }
    if !cooldown.is_ready(tick) {
        return Err(CastRejection::OnCooldown {
            remaining: cooldown.remaining_seconds(tick, tick_rate_hz),
        });
    }
    if !mana.can_afford(mana_cost) {
        return Err(CastRejection::InsufficientMana {
            required: mana_cost,
            available: mana.current(),
        });
    }
    Ok(())
}

/// Runs the ability phase: cast-button presses and explicit cast messages
/// for every player, in ascending id order.
pub fn tick_casts(world: &mut World) {
    let fireball_tuning = world.tuning.fireball;
    let players = world.ids_where(|e| e.as_player().is_some());

    for id in players {
        let Some(entity) = world.get_mut(id) else {
            continue;
        };
        let position = entity.position;
        let Some(player) = entity.as_player_mut() else {
            continue;
        };

        let forward = player.movement.input.camera_forward();
        let edges = player.movement.edges;
        let mut requests = Vec::new();
        if edges.cast_slot_1 {
            requests.push(CastRequest::from_camera(
                AbilitySlot::Fireball,
                position,
                forward,
                &fireball_tuning,
            ));
        }
        if edges.cast_slot_2 {
            requests.push(CastRequest::from_camera(
                AbilitySlot::SummonGolems,
                position,
                forward,
                &fireball_tuning,
            ));
        }
        requests.extend(
            player
                .pending_casts
                .drain(..)
                .map(|r| r.sanitized(position, forward, &fireball_tuning)),
        );

        let player_id = player.player_id;
        for request in requests {
            if let Err(rejection) = execute_cast(world, id, request) {
                debug!(player_id, slot = request.slot.index(), ?rejection, "cast rejected");
            }
        }
    }

    world.flush_commands();
}

/// Authoritative cast: validate, pay, start the cooldown, then spawn.
pub fn execute_cast(
    world: &mut World,
    caster: EntityId,
    request: CastRequest,
) -> Result<(), CastRejection> {
    let (tick, tick_rate_hz) = (world.tick(), world.tick_rate_hz());
    let cost = request.slot.mana_cost(&world.tuning);

    let entity = world.get_mut(caster).ok_or(CastRejection::CasterMissing)?;
    let position = entity.position;
    let player = entity.as_player_mut().ok_or(CastRejection::CasterMissing)?;

    validate_cast(
        player.spellbook.cooldown(request.slot),
        cost,
        &player.mana,
        player.health.is_dead(),
        tick,
        tick_rate_hz,
    )?;
    if !player.mana.try_consume(cost, Role::Authority) {
        return Err(CastRejection::InsufficientMana {
            required: cost,
            available: player.mana.current(),
        });
    }
    player.spellbook.cooldown_mut(request.slot).record(tick);
    let player_id = player.player_id;

    match request.slot {
        AbilitySlot::Fireball => {
            spawn_fireball(
                world,
                FireballSpawn {
                    owner: caster,
                    faction: Faction::Players,
                    origin: request.spawn_position,
                    direction: request.direction,
                    speed: None,
                    scale: None,
                },
            );
            debug!(player_id, "fireball cast");
        }
        AbilitySlot::SummonGolems => {
            let count = summon_golems(world, caster, position);
            info!(player_id, count, "golems summoned");
        }
    }
    Ok(())
}

pub struct FireballSpawn {
    pub owner: EntityId,
    pub faction: Faction,
    pub origin: Vec3,
    pub direction: Vec3,
    /// `None` keeps the tuning default.
    pub speed: Option<f32>,
    pub scale: Option<f32>,
}

/// Queues a fireball; it appears when the phase's commands are flushed.
pub fn spawn_fireball(world: &mut World, spawn: FireballSpawn) -> EntityId {
    let tuning = world.tuning.fireball;
    let now = world.now();
    let id = world.reserve_id();
    let direction = spawn.direction.normalize_or(Vec3::Z);
    let scale = spawn.scale.unwrap_or(tuning.scale);

    world.commands.spawn(Entity {
        id,
        position: spawn.origin,
        yaw: direction.x.atan2(direction.z),
        kind: EntityKind::Fireball(Projectile {
            owner: spawn.owner,
            faction: spawn.faction,
            direction,
            speed: spawn.speed.unwrap_or(tuning.speed),
            scale,
            radius: tuning.radius * scale,
            damage: tuning.damage,
            spawn_time: now,
            lifetime: tuning.lifetime,
            has_hit: false,
            previous_position: spawn.origin,
        }),
    });
    id
}

/// Replaces the caster's golems with a fresh batch. The old batch is
/// despawned in the same flush the new one spawns in.
fn summon_golems(world: &mut World, caster: EntityId, caster_position: Vec3) -> usize {
    let summon = world.tuning.golem_summon;
    let golem_tuning = world.tuning.golem;
    let tick_rate_hz = world.tick_rate_hz();

    let previous = world
        .get_mut(caster)
        .and_then(Entity::as_player_mut)
        .map(|p| std::mem::take(&mut p.golems))
        .unwrap_or_default();
    for id in previous {
        world.commands.despawn(id);
    }

    let mut spawned = Vec::with_capacity(summon.count as usize);
    for _ in 0..summon.count {
        let angle = world.rng.random_range(0.0..std::f32::consts::TAU);
        let distance = if summon.max_radius > summon.min_radius {
            world.rng.random_range(summon.min_radius..summon.max_radius)
        } else {
            summon.min_radius
        };
        let offset = Vec3::new(angle.sin(), 0.0, angle.cos()) * distance;
        let position = golem_ground_point(
            world.terrain(),
            caster_position + offset,
            caster_position.y,
            summon.spawn_height_offset,
        );
        let seed: u32 = world.rng.random();

        let id = world.reserve_id();
        world.commands.spawn(Entity {
            id,
            position,
            yaw: angle,
            kind: EntityKind::Golem(GolemState::new(caster, seed, &golem_tuning, tick_rate_hz)),
        });
        spawned.push(id);
    }

    let count = spawned.len();
    if let Some(player) = world.get_mut(caster).and_then(Entity::as_player_mut) {
        player.golems = spawned;
    }
    count
}

fn golem_ground_point(terrain: &dyn Terrain, point: Vec3, caster_height: f32, lift: f32) -> Vec3 {
    let origin = Vec3::new(point.x, caster_height + GOLEM_RAY_HEIGHT, point.z);
    match terrain.raycast(origin, Vec3::NEG_Y, GOLEM_RAY_DISTANCE) {
        Some(hit) => hit + Vec3::Y * lift,
        None => Vec3::new(point.x, caster_height, point.z),
    }
}

/// Directions for a multi-fireball volley: a horizontal fan of `count`
/// evenly spaced shots spanning `cone_angle_deg` around `base`.
pub fn fireball_cone_directions(base: Vec3, count: u32, cone_angle_deg: f32) -> Vec<Vec3> {
    let base = base.normalize_or(Vec3::Z);
    match count {
        0 => Vec::new(),
        1 => vec![base],
        _ => {
            let right = Vec3::Y.cross(base).normalize_or(Vec3::X);
            let axis = base.cross(right).normalize_or(Vec3::Y);
            let step = cone_angle_deg / (count - 1) as f32;
            (0..count)
                .map(|i| {
                    let angle = -cone_angle_deg / 2.0 + step * i as f32;
                    Quat::from_axis_angle(axis, angle.to_radians()) * base
                })
                .collect()
        }
    }
}

/// Ground positions for a cone of ice spikes fanning out from `origin`.
/// Each row holds at most `MAX_SPAWNS_PER_CAST` spikes.
pub fn cone_spike_positions(
    origin: Vec3,
    direction: Vec3,
    rows: u32,
    row_spacing: f32,
    half_angle_deg: f32,
    spike_spacing: f32,
) -> Vec<Vec3> {
    let forward = Vec3::new(direction.x, 0.0, direction.z).normalize_or(Vec3::Z);
    let right = Vec3::Y.cross(forward);
    let tan = half_angle_deg.to_radians().tan();
    let mut positions = Vec::new();

    for row in 0..rows {
        let distance = row_spacing * (row + 1) as f32;
        let width = 2.0 * distance * tan;
        let count = ((width / spike_spacing).floor() as u32).min(MAX_SPAWNS_PER_CAST - 1) + 1;
        let center = origin + forward * distance;
        if count == 1 {
            positions.push(center);
            continue;
        }
        let step = width / (count - 1) as f32;
        for i in 0..count {
            positions.push(center + right * (-width / 2.0 + step * i as f32));
        }
    }
    positions
}

/// Random subset of at most `max` candidates (partial Fisher-Yates).
pub fn choose_targets<R: Rng + ?Sized>(
    candidates: &[EntityId],
    max: usize,
    rng: &mut R,
) -> Vec<EntityId> {
    let mut pool = candidates.to_vec();
    let take = max.min(pool.len());
    for i in 0..take {
        let j = rng.random_range(i..pool.len());
        pool.swap(i, j);
    }
    pool.truncate(take);
    pool
}

/// Point on the ground below `point`, or one unit below it when nothing is hit.
pub fn ground_below(terrain: &dyn Terrain, point: Vec3, search_distance: f32) -> Vec3 {
    terrain
        .raycast(point + Vec3::Y * 0.5, Vec3::NEG_Y, search_distance)
        .unwrap_or(point - Vec3::Y)
}

/// Queues an ice spike rooted at `ground`.
pub fn spawn_ice_spike(
    world: &mut World,
    owner: EntityId,
    origin: SpikeOrigin,
    ground: Vec3,
) -> EntityId {
    let tuning = world.tuning.ice_spike;
    let now = world.now();
    let id = world.reserve_id();
    world.commands.spawn(Entity {
        id,
        position: ground,
        yaw: 0.0,
        kind: EntityKind::IceSpike(IceSpike {
            owner,
            faction: Faction::Boss,
            origin,
            ground,
            max_height: tuning.max_height,
            spawn_time: now,
            telegraph_time: tuning.telegraph_time,
            lifetime: tuning.lifetime,
            damage: tuning.damage,
            radius: tuning.radius,
            has_hit: false,
        }),
    });
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::terrain::FlatGround;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn world() -> World {
        World::new(
            Tuning::standard(),
            Box::new(FlatGround::new(0.0, 100.0, 100.0)),
            10,
        )
        .expect("standard tuning builds a world")
    }

    fn fireball_at(position: Vec3) -> CastRequest {
        CastRequest {
            slot: AbilitySlot::Fireball,
            spawn_position: position,
            direction: Vec3::Z,
        }
    }

    fn mana(world: &World, player_id: u64) -> f32 {
        world.player(player_id).map(|p| p.mana.current()).unwrap_or_default()
    }

    #[test]
    fn when_cooldown_is_running_then_cast_is_rejected_without_side_effects() {
        let mut world = world();
        let caster = world.add_player(1);

        assert_eq!(execute_cast(&mut world, caster, fireball_at(Vec3::Y)), Ok(()));
        assert_eq!(mana(&world, 1), 230.0);

        // 4.9 s later at 10 Hz.
        for _ in 0..49 {
            world.advance_tick();
        }
        let result = execute_cast(&mut world, caster, fireball_at(Vec3::Y));

        assert!(matches!(result, Err(CastRejection::OnCooldown { .. })));
        assert_eq!(mana(&world, 1), 230.0);
        let last = world
            .player(1)
            .and_then(|p| p.spellbook.cooldown(AbilitySlot::Fireball).last_cast());
        assert_eq!(last, Some(0));

        world.advance_tick();
        assert_eq!(execute_cast(&mut world, caster, fireball_at(Vec3::Y)), Ok(()));
        assert_eq!(mana(&world, 1), 210.0);
    }

    #[test]
    fn when_exactly_one_cooldown_has_passed_then_cast_is_accepted() {
        let mut world = world();
        let caster = world.add_player(1);
        for _ in 0..32 {
            world.advance_tick();
        }
        assert_eq!(execute_cast(&mut world, caster, fireball_at(Vec3::Y)), Ok(()));

        // 3.2 s to 8.2 s: the float difference lands just under 5.0.
        for _ in 0..50 {
            world.advance_tick();
        }

        assert_eq!(execute_cast(&mut world, caster, fireball_at(Vec3::Y)), Ok(()));
    }

    #[test]
    fn when_mana_is_short_then_cast_is_rejected() {
        let mut world = world();
        let caster = world.add_player(1);
        let summon = CastRequest {
            slot: AbilitySlot::SummonGolems,
            ..fireball_at(Vec3::ZERO)
        };

        for _ in 0..5 {
            assert_eq!(execute_cast(&mut world, caster, summon), Ok(()));
        }
        let result = execute_cast(&mut world, caster, summon);

        assert_eq!(
            result,
            Err(CastRejection::InsufficientMana {
                required: 50.0,
                available: 0.0
            })
        );
    }

    #[test]
    fn when_caster_is_dead_then_dead_check_wins_over_cooldown() {
        let mut cooldown = Cooldown::new(50);
        cooldown.record(0);

        let result = validate_cast(&cooldown, 20.0, &ResourcePool::mana(0.0), true, 10, 10);

        assert_eq!(result, Err(CastRejection::CasterDead));
    }

    #[test]
    fn new_golem_batch_replaces_the_previous_one() {
        let mut world = world();
        let caster = world.add_player(1);
        let summon = CastRequest {
            slot: AbilitySlot::SummonGolems,
            ..fireball_at(Vec3::ZERO)
        };

        execute_cast(&mut world, caster, summon).expect("first summon");
        world.flush_commands();
        let first: Vec<EntityId> = world.player(1).map(|p| p.golems.clone()).unwrap_or_default();
        execute_cast(&mut world, caster, summon).expect("second summon");
        world.flush_commands();

        assert_eq!(first.len(), 3);
        assert_eq!(world.golem_snapshots().len(), 3);
        assert!(first.iter().all(|id| world.get(*id).is_none()));
        for golem in world.golem_snapshots() {
            let offset = golem.position - Vec3::new(0.0, golem.position.y, 0.0);
            assert!(offset.length() >= 3.0 - 1e-4 && offset.length() <= 6.0 + 1e-4);
            assert_eq!(golem.position.y, 2.0);
        }
    }

    #[test]
    fn fireball_cone_spreads_evenly_across_the_angle() {
        let directions = fireball_cone_directions(Vec3::Z, 5, 45.0);

        let angles: Vec<f32> = directions
            .iter()
            .map(|d| d.x.atan2(d.z).to_degrees())
            .collect();
        let expected = [-22.5, -11.25, 0.0, 11.25, 22.5];
        for (angle, want) in angles.iter().zip(expected) {
            assert!((angle - want).abs() < 1e-3, "{angle} != {want}");
        }
        assert!(directions.iter().all(|d| d.y.abs() < 1e-5));
    }

    #[test]
    fn single_fireball_flies_straight() {
        let base = Vec3::new(1.0, 0.0, 1.0);

        let directions = fireball_cone_directions(base, 1, 45.0);

        assert_eq!(directions, vec![base.normalize()]);
    }

    #[test]
    fn cone_spike_rows_widen_with_distance() {
        let positions = cone_spike_positions(Vec3::ZERO, Vec3::Z, 3, 3.0, 30.0, 1.5);

        assert_eq!(positions.len(), 3 + 5 + 7);
        assert!((positions[1] - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-4);
    }

    #[test]
    fn wide_cone_rows_are_capped() {
        let positions = cone_spike_positions(Vec3::ZERO, Vec3::Z, 3, 3.0, 89.999, 1.5);

        assert_eq!(positions.len(), 3 * MAX_SPAWNS_PER_CAST as usize);
        assert!(positions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn narrow_cone_rows_place_a_single_centered_spike() {
        let positions = cone_spike_positions(Vec3::ZERO, Vec3::X, 2, 2.0, 1.0, 5.0);

        assert_eq!(positions.len(), 2);
        assert!((positions[0] - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn target_subset_is_bounded_and_unique() {
        let mut rng = SmallRng::seed_from_u64(7);
        let candidates: Vec<EntityId> = (1..=5).map(EntityId).collect();

        let picked = choose_targets(&candidates, 3, &mut rng);
        let few = choose_targets(&candidates[..2], 3, &mut rng);

        assert_eq!(picked.len(), 3);
        let mut unique = picked.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
        assert_eq!(few.len(), 2);
    }

    #[test]
    fn client_aim_is_clamped_and_nan_direction_falls_back() {
        let tuning = FireballTuning::default();
        let request = CastRequest {
            slot: AbilitySlot::Fireball,
            spawn_position: Vec3::new(100.0, 0.0, 0.0),
            direction: Vec3::new(f32::NAN, 0.0, 1.0),
        };

        let clean = request.sanitized(Vec3::ZERO, Vec3::X, &tuning);

        assert_eq!(clean.direction, Vec3::X);
        assert!((clean.spawn_position.length() - tuning.max_spawn_offset).abs() < 1e-4);
    }

    #[test]
    fn spike_roots_on_the_ground_or_falls_back() {
        let ground = FlatGround::new(0.0, 100.0, 100.0);

        assert_eq!(ground_below(&ground, Vec3::new(1.0, 0.0, 1.0), 20.0), Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(
            ground_below(&ground, Vec3::new(1.0, 50.0, 1.0), 20.0),
            Vec3::new(1.0, 49.0, 1.0)
        );
    }
}
