// Domain layer: core simulation types and rules.

pub mod cooldown;
pub mod errors;
pub mod resources;
pub mod scheduler;
pub mod state;
pub mod systems;
pub mod terrain;
pub mod tuning;
pub mod world;

pub use errors::{CastRejection, RespawnRejection, WorldError};
pub use state::{
    BossSnapshot, DragonSnapshot, EntityId, GolemSnapshot, PlayerInput, PlayerSnapshot,
    ProjectileKind, ProjectileSnapshot, TeleporterSnapshot,
};
pub use systems::abilities::{AbilitySlot, CastRequest};
pub use terrain::{FlatGround, Terrain};
pub use tuning::Tuning;
pub use world::World;
