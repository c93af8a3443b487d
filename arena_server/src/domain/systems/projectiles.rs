use crate::domain::state::{Entity, EntityId, EntityKind, Faction};
use crate::domain::world::World;
use glam::Vec3;
use tracing::info;

pub struct Projectile {
    pub owner: EntityId,
    pub faction: Faction,
    pub direction: Vec3,
    pub speed: f32,
    pub scale: f32,
    pub radius: f32,
    pub damage: f32,
    pub spawn_time: f64,
    pub lifetime: f64,
    pub has_hit: bool,
    pub previous_position: Vec3,
}

impl Projectile {
    /// Single-hit latch shared by every collision path. True exactly once.
    pub fn try_hit(&mut self) -> bool {
        !std::mem::replace(&mut self.has_hit, true)
    }

    pub fn expired(&self, now: f64) -> bool {
        now - self.spawn_time >= self.lifetime
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpikeOrigin {
    Targeted,
    Cone,
}

/// Ground-rooted spike that grows during its telegraph and only hurts once
/// fully grown.
pub struct IceSpike {
    pub owner: EntityId,
    pub faction: Faction,
    pub origin: SpikeOrigin,
    pub ground: Vec3,
    pub max_height: f32,
    pub spawn_time: f64,
    pub telegraph_time: f64,
    pub lifetime: f64,
    pub damage: f32,
    pub radius: f32,
    pub has_hit: bool,
}

impl IceSpike {
    pub fn height_ratio(&self, now: f64) -> f32 {
        if self.telegraph_time <= 0.0 {
            return 1.0;
        }
        ((now - self.spawn_time) / self.telegraph_time).clamp(0.0, 1.0) as f32
    }

    pub fn is_lethal(&self, now: f64) -> bool {
        self.height_ratio(now) >= 1.0
    }

    pub fn try_hit(&mut self) -> bool {
        !std::mem::replace(&mut self.has_hit, true)
    }

    pub fn expired(&self, now: f64) -> bool {
        now - self.spawn_time >= self.lifetime
    }

    /// Vertical extent of the spike body right now.
    fn column(&self, now: f64) -> (f32, f32) {
        let top = self.ground.y + self.max_height * self.height_ratio(now);
        (self.ground.y, top)
    }
}

/// Whether a projectile from `faction` owned by `owner` may damage `target`.
pub fn is_valid_target(faction: Faction, owner: EntityId, target: &Entity) -> bool {
    target.id != owner && target.is_alive_body() && faction.is_hostile_to(target.faction())
}

/// Swept sphere test: does the segment pass within `radius` of `center`?
pub fn segment_hits_sphere(start: Vec3, end: Vec3, center: Vec3, radius: f32) -> bool {
    let segment = end - start;
    let length_sq = segment.length_squared();
    let t = if length_sq > f32::EPSILON {
        ((center - start).dot(segment) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = start + segment * t;
    closest.distance_squared(center) <= radius * radius
}

pub fn tick_projectiles(world: &mut World) {
    let now = world.now();
    let dt = world.dt();

    let fireballs = world.ids_where(|e| matches!(e.kind, EntityKind::Fireball(_)));
    for id in fireballs {
        tick_fireball(world, id, now, dt);
    }

    let spikes = world.ids_where(|e| matches!(e.kind, EntityKind::IceSpike(_)));
    for id in spikes {
        tick_ice_spike(world, id, now);
    }

    world.flush_commands();
}

fn tick_fireball(world: &mut World, id: EntityId, now: f64, dt: f32) {
    let Some(entity) = world.get_mut(id) else {
        return;
    };
    let EntityKind::Fireball(projectile) = &mut entity.kind else {
        return;
    };
    let start = entity.position;
    let end = start + projectile.direction * projectile.speed * dt;
    projectile.previous_position = start;
    entity.position = end;
    let (owner, faction, radius) = (projectile.owner, projectile.faction, projectile.radius);

    // Trigger path: anything the projectile swept through this tick.
    let swept: Vec<EntityId> = world
        .entities()
        .filter(|e| is_valid_target(faction, owner, e))
        .filter_map(|e| {
            let center = e.body_center()?;
            let reach = e.body_radius()? + radius;
            segment_hits_sphere(start, end, center, reach).then_some(e.id)
        })
        .collect();
    // Fallback path: overlap at the resting position.
    let overlapping: Vec<EntityId> = world
        .overlap_sphere(end, radius)
        .into_iter()
        .filter(|target| {
            world
                .get(*target)
                .is_some_and(|e| is_valid_target(faction, owner, e))
        })
        .collect();

    let mut hit = false;
    for target in swept.into_iter().chain(overlapping) {
        let latched = match world.get_mut(id).map(|e| &mut e.kind) {
            Some(EntityKind::Fireball(projectile)) => projectile.try_hit(),
            _ => false,
        };
        if !latched {
            continue;
        }
        let damage = match world.get(id).map(|e| &e.kind) {
            Some(EntityKind::Fireball(projectile)) => projectile.damage,
            _ => 0.0,
        };
        info!(
            projectile_id = id.0,
            shooter_id = owner.0,
            victim_id = target.0,
            damage,
            "projectile hit"
        );
        world.commands.damage(owner, target, damage);
        world.commands.despawn(id);
        hit = true;
    }

    // A hit this tick wins over lifetime expiry.
    if !hit {
        let expired = match world.get(id).map(|e| &e.kind) {
            Some(EntityKind::Fireball(projectile)) => projectile.expired(now),
            _ => false,
        };
        if expired {
            world.commands.despawn(id);
        }
    }
}

fn tick_ice_spike(world: &mut World, id: EntityId, now: f64) {
    let Some(entity) = world.get(id) else {
        return;
    };
    let EntityKind::IceSpike(spike) = &entity.kind else {
        return;
    };

    if spike.expired(now) {
        world.commands.despawn(id);
        return;
    }
    if spike.has_hit || !spike.is_lethal(now) {
        return;
    }

    let (bottom, top) = spike.column(now);
    let (owner, faction, ground, reach, damage) = (
        spike.owner,
        spike.faction,
        spike.ground,
        spike.radius,
        spike.damage,
    );
    let touching: Vec<EntityId> = world
        .entities()
        .filter(|e| is_valid_target(faction, owner, e))
        .filter_map(|e| {
            let r = e.body_radius()?;
            let center = e.body_center()?;
            let horizontal = Vec3::new(center.x - ground.x, 0.0, center.z - ground.z);
            let within_column = center.y + r >= bottom && center.y - r <= top;
            (within_column && horizontal.length() <= reach + r).then_some(e.id)
        })
        .collect();

    for target in touching {
        let latched = match world.get_mut(id).map(|e| &mut e.kind) {
            Some(EntityKind::IceSpike(spike)) => spike.try_hit(),
            _ => false,
        };
        if latched {
            info!(spike_id = id.0, victim_id = target.0, damage, "ice spike hit");
            world.commands.damage(owner, target, damage);
            world.commands.despawn(id);
        }
    }
}
