// Wire protocol DTOs and conversions for public arena server messages.
// Internal service-to-service DTOs live with their HTTP handlers.

use crate::domain::{
    AbilitySlot, BossSnapshot, CastRequest, DragonSnapshot, GolemSnapshot, PlayerInput,
    PlayerSnapshot, ProjectileKind, ProjectileSnapshot, TeleporterSnapshot,
};
use crate::use_cases::{PlayerSession, ServerState, WorldUpdate};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity after Join. The token lets a later socket resume it.
    Identity {
        player_id: String,
        reconnect_token: String,
    },
    // Snapshot of the world for a given tick.
    WorldUpdate(WorldUpdateDto),
    // High-level server state transitions (lobby, match start/end).
    GameState(ServerStateDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message with identity metadata.
    Join(JoinPayload),
    // Held-button and stick state, sent every client frame after Join.
    Input(PlayerInputDto),
    // Explicitly aimed cast, usually produced by client prediction.
    Cast(CastRequestDto),
    // Ask to come back after death at a chosen point.
    Respawn(RespawnDto),
}

/// Payload for the Join handshake.
///
/// A client resumes an existing identity only by presenting the token the
/// server issued for it. Anything else gets a fresh id.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub display_name: String,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub reconnect_token: Option<String>,
}

impl JoinPayload {
    /// The identity this Join claims, if both halves parse.
    pub fn claim(&self) -> Option<PlayerSession> {
        let player_id = self.player_id.as_deref()?.trim().parse().ok()?;
        let reconnect_token = self.reconnect_token.as_deref()?.trim().parse().ok()?;
        Some(PlayerSession {
            player_id,
            reconnect_token,
        })
    }
}

impl From<PlayerSession> for ServerMessage {
    fn from(session: PlayerSession) -> Self {
        ServerMessage::Identity {
            player_id: session.player_id.to_string(),
            reconnect_token: session.reconnect_token.to_string(),
        }
    }
}

/// Per-tick input payload sent by the client after joining.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PlayerInputDto {
    pub move_x: f32,
    pub move_y: f32,
    pub jump: bool,
    pub sprint: bool,
    pub cast_slot_1: bool,
    pub cast_slot_2: bool,
    // Degrees.
    pub camera_yaw: f32,
}

impl From<PlayerInputDto> for PlayerInput {
    fn from(input: PlayerInputDto) -> Self {
        Self {
            move_dir: Vec2::new(input.move_x, input.move_y),
            jump: input.jump,
            sprint: input.sprint,
            cast_slot_1: input.cast_slot_1,
            cast_slot_2: input.cast_slot_2,
            camera_yaw: input.camera_yaw,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CastRequestDto {
    /// 1-based action bar slot.
    pub slot: u8,
    pub spawn_position: [f32; 3],
    pub direction: [f32; 3],
}

/// A cast for an action bar slot that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownAbilitySlot(pub u8);

impl TryFrom<CastRequestDto> for CastRequest {
    type Error = UnknownAbilitySlot;

    fn try_from(dto: CastRequestDto) -> Result<Self, Self::Error> {
        let slot = AbilitySlot::from_index(dto.slot).ok_or(UnknownAbilitySlot(dto.slot))?;
        Ok(Self {
            slot,
            spawn_position: Vec3::from_array(dto.spawn_position),
            direction: Vec3::from_array(dto.direction),
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RespawnDto {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<RespawnDto> for Vec3 {
    fn from(dto: RespawnDto) -> Self {
        Vec3::new(dto.x, dto.y, dto.z)
    }
}

/// Snapshot of the world sent to clients at the replication rate.
#[derive(Debug, Clone, Serialize)]
pub struct WorldUpdateDto {
    pub tick: u64,
    pub time: f64,
    pub players: Vec<PlayerStateDto>,
    pub boss: Option<BossStateDto>,
    pub golems: Vec<GolemStateDto>,
    pub dragons: Vec<DragonStateDto>,
    pub projectiles: Vec<ProjectileStateDto>,
    pub teleporters: Vec<TeleporterStateDto>,
}

impl From<WorldUpdate> for WorldUpdateDto {
    fn from(update: WorldUpdate) -> Self {
        Self {
            tick: update.tick,
            time: update.time,
            players: update.players.iter().map(PlayerStateDto::from).collect(),
            boss: update.boss.as_ref().map(BossStateDto::from),
            golems: update.golems.iter().map(GolemStateDto::from).collect(),
            dragons: update.dragons.iter().map(DragonStateDto::from).collect(),
            projectiles: update
                .projectiles
                .iter()
                .map(ProjectileStateDto::from)
                .collect(),
            teleporters: update
                .teleporters
                .iter()
                .map(TeleporterStateDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnimationDto {
    pub is_grounded: bool,
    pub is_jumping: bool,
    pub is_idle: bool,
    pub is_walking: bool,
    pub is_sprinting: bool,
}

/// Flattened player state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStateDto {
    pub id: String,
    pub player_id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub is_dead: bool,
    pub jump_count: u8,
    pub animation: AnimationDto,
    pub fireball_cast_tick: Option<u64>,
    pub summon_cast_tick: Option<u64>,
}

impl From<&PlayerSnapshot> for PlayerStateDto {
    fn from(p: &PlayerSnapshot) -> Self {
        Self {
            id: p.id.to_string(),
            player_id: p.player_id.to_string(),
            x: p.position.x,
            y: p.position.y,
            z: p.position.z,
            yaw: p.yaw,
            health: p.health,
            max_health: p.max_health,
            mana: p.mana,
            max_mana: p.max_mana,
            is_dead: p.is_dead,
            jump_count: p.jump_count,
            animation: AnimationDto {
                is_grounded: p.animation.is_grounded,
                is_jumping: p.animation.is_jumping,
                is_idle: p.animation.is_idle,
                is_walking: p.animation.is_walking,
                is_sprinting: p.animation.is_sprinting,
            },
            fireball_cast_tick: p.fireball_cast_tick,
            summon_cast_tick: p.summon_cast_tick,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BossStateDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub health: f32,
    pub max_health: f32,
}

impl From<&BossSnapshot> for BossStateDto {
    fn from(b: &BossSnapshot) -> Self {
        Self {
            id: b.id.to_string(),
            x: b.position.x,
            y: b.position.y,
            z: b.position.z,
            yaw: b.yaw,
            health: b.health,
            max_health: b.max_health,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GolemStateDto {
    pub id: String,
    pub owner_id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub health: f32,
    pub mode: &'static str,
}

impl From<&GolemSnapshot> for GolemStateDto {
    fn from(g: &GolemSnapshot) -> Self {
        Self {
            id: g.id.to_string(),
            owner_id: g.owner_id.to_string(),
            x: g.position.x,
            y: g.position.y,
            z: g.position.z,
            yaw: g.yaw,
            health: g.health,
            mode: g.mode,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DragonStateDto {
    pub id: String,
    pub owner_id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub mode: &'static str,
}

impl From<&DragonSnapshot> for DragonStateDto {
    fn from(d: &DragonSnapshot) -> Self {
        Self {
            id: d.id.to_string(),
            owner_id: d.owner_id.to_string(),
            x: d.position.x,
            y: d.position.y,
            z: d.position.z,
            yaw: d.yaw,
            mode: d.mode,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectileKindDto {
    Fireball,
    IceSpike,
    ConeIceSpike,
}

impl From<ProjectileKind> for ProjectileKindDto {
    fn from(kind: ProjectileKind) -> Self {
        match kind {
            ProjectileKind::Fireball => ProjectileKindDto::Fireball,
            ProjectileKind::IceSpike => ProjectileKindDto::IceSpike,
            ProjectileKind::ConeIceSpike => ProjectileKindDto::ConeIceSpike,
        }
    }
}

/// Flattened projectile state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectileStateDto {
    pub id: String,
    pub owner_id: String,
    pub kind: ProjectileKindDto,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    pub dir_z: f32,
    pub scale: f32,
    pub height_ratio: f32,
}

impl From<&ProjectileSnapshot> for ProjectileStateDto {
    fn from(p: &ProjectileSnapshot) -> Self {
        Self {
            id: p.id.to_string(),
            owner_id: p.owner_id.to_string(),
            kind: p.kind.into(),
            x: p.position.x,
            y: p.position.y,
            z: p.position.z,
            dir_x: p.direction.x,
            dir_y: p.direction.y,
            dir_z: p.direction.z,
            scale: p.scale,
            height_ratio: p.height_ratio,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeleporterStateDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub radius: f32,
    pub occupants: u32,
    // Absent while nobody stands inside.
    pub remaining_seconds: Option<f64>,
}

impl From<&TeleporterSnapshot> for TeleporterStateDto {
    fn from(t: &TeleporterSnapshot) -> Self {
        Self {
            id: t.id.to_string(),
            x: t.position.x,
            y: t.position.y,
            z: t.position.z,
            radius: t.radius,
            occupants: t.occupants,
            remaining_seconds: t.remaining_seconds,
        }
    }
}

/// Server lifecycle state sent to clients for UI flow.
#[derive(Debug, Clone, Serialize)]
pub enum ServerStateDto {
    Lobby,
    MatchStarting { in_seconds: u32 },
    MatchRunning,
    MatchEnded,
}

impl From<ServerState> for ServerStateDto {
    fn from(state: ServerState) -> Self {
        match state {
            ServerState::Lobby => ServerStateDto::Lobby,
            ServerState::MatchStarting { in_seconds } => {
                ServerStateDto::MatchStarting { in_seconds }
            }
            ServerState::MatchRunning => ServerStateDto::MatchRunning,
            ServerState::MatchEnded => ServerStateDto::MatchEnded,
        }
    }
}
