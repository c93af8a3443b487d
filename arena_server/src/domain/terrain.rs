// Static collision seam: ground raycasts and the character motion primitive.
// The simulation only talks to this trait, so a real collision backend can be
// swapped in without touching the systems.

use glam::Vec3;

/// Result of moving a character controller by a displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub position: Vec3,
    pub grounded: bool,
}

pub trait Terrain: Send + Sync {
    /// First hit point along the ray, if any.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<Vec3>;

    /// Moves a character by `displacement`, resolving collision with the static world.
    fn move_character(&self, position: Vec3, displacement: Vec3, radius: f32) -> Motion;

    /// Keeps an arbitrary point (e.g. a requested respawn position) inside the playable area.
    fn clamp_to_bounds(&self, position: Vec3) -> Vec3;
}

/// Horizontal ground plane with rectangular walls.
#[derive(Debug, Clone, Copy)]
pub struct FlatGround {
    pub height: f32,
    pub half_extent_x: f32,
    pub half_extent_z: f32,
}

impl FlatGround {
    pub fn new(height: f32, half_extent_x: f32, half_extent_z: f32) -> Self {
        Self {
            height,
            half_extent_x,
            half_extent_z,
        }
    }
}

impl Terrain for FlatGround {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<Vec3> {
        let dir = direction.normalize_or_zero();
        // Parallel to (or pointing away from) the plane: no hit.
        if dir.y.abs() <= f32::EPSILON {
            return None;
        }
        let t = (self.height - origin.y) / dir.y;
        if t < 0.0 || t > max_distance {
            return None;
        }
        Some(origin + dir * t)
    }

    fn move_character(&self, position: Vec3, displacement: Vec3, radius: f32) -> Motion {
        let mut next = position + displacement;
        let mut grounded = false;

        if next.y <= self.height {
            next.y = self.height;
            grounded = displacement.y <= 0.0;
        }

        let limit_x = (self.half_extent_x - radius).max(0.0);
        let limit_z = (self.half_extent_z - radius).max(0.0);
        next.x = next.x.clamp(-limit_x, limit_x);
        next.z = next.z.clamp(-limit_z, limit_z);

        Motion {
            position: next,
            grounded,
        }
    }

    fn clamp_to_bounds(&self, position: Vec3) -> Vec3 {
        Vec3::new(
            position.x.clamp(-self.half_extent_x, self.half_extent_x),
            position.y.max(self.height),
            position.z.clamp(-self.half_extent_z, self.half_extent_z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downward_ray_hits_the_plane() {
        let ground = FlatGround::new(0.0, 50.0, 50.0);

        let hit = ground.raycast(Vec3::new(2.0, 10.0, 3.0), Vec3::NEG_Y, 20.0);

        assert_eq!(hit, Some(Vec3::new(2.0, 0.0, 3.0)));
        assert_eq!(ground.raycast(Vec3::new(0.0, 30.0, 0.0), Vec3::NEG_Y, 20.0), None);
    }

    #[test]
    fn falling_character_lands_on_the_plane() {
        let ground = FlatGround::new(0.0, 50.0, 50.0);

        let motion = ground.move_character(Vec3::new(0.0, 0.2, 0.0), Vec3::new(1.0, -0.5, 0.0), 0.5);

        assert!(motion.grounded);
        assert_eq!(motion.position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn rising_character_is_not_grounded() {
        let ground = FlatGround::new(0.0, 50.0, 50.0);

        let motion = ground.move_character(Vec3::ZERO, Vec3::new(0.0, 0.3, 0.0), 0.5);

        assert!(!motion.grounded);
        assert_eq!(motion.position.y, 0.3);
    }
}
