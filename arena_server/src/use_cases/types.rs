// Use-case level inputs/outputs for the game loop.

use crate::domain::{
    BossSnapshot, CastRequest, DragonSnapshot, GolemSnapshot, PlayerInput, PlayerSnapshot,
    ProjectileSnapshot, TeleporterSnapshot,
};
use glam::Vec3;

#[derive(Debug, Clone)]
pub enum GameEvent {
    Join { player_id: u64 },
    Leave { player_id: u64 },
    Input { player_id: u64, input: PlayerInput },
    Cast { player_id: u64, request: CastRequest },
    Respawn { player_id: u64, position: Vec3 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    Lobby,
    MatchStarting { in_seconds: u32 },
    MatchRunning,
    MatchEnded,
}

/// Replicated snapshot of one tick. Clients treat it as eventually
/// consistent and never write back.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldUpdate {
    pub tick: u64,
    /// Simulation time in seconds.
    pub time: f64,
    pub players: Vec<PlayerSnapshot>,
    pub boss: Option<BossSnapshot>,
    pub golems: Vec<GolemSnapshot>,
    pub dragons: Vec<DragonSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub teleporters: Vec<TeleporterSnapshot>,
}
