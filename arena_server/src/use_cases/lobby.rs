// Lobby orchestration for spawning and managing match worlds.

use crate::domain::{Tuning, WorldError};
use crate::use_cases::game::{LoopSettings, Simulation, world_task};
use crate::use_cases::{GameEvent, ServerState, WorldUpdate};
use axum::extract::ws::Utf8Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, RwLock, broadcast, mpsc, watch};
use tracing::info;

/// Shared configuration for spawning lobby worlds.
#[derive(Debug, Clone)]
pub struct LobbySettings {
    /// Capacity for inbound player input events.
    pub input_channel_capacity: usize,
    /// Capacity for broadcast world updates.
    pub world_broadcast_capacity: usize,
    /// Tick rate, replication rate and countdown for the world loop.
    pub loop_settings: LoopSettings,
    /// Gameplay tuning every new match starts from.
    pub tuning: Arc<Tuning>,
}

/// Errors returned by lobby registry operations.
#[derive(Debug)]
pub enum LobbyError {
    /// Lobby already exists and cannot be re-created.
    AlreadyExists,
    /// The configured tuning cannot build a world.
    InvalidTuning(WorldError),
}

/// Server-issued identity. Only a Join presenting the matching token may
/// resume `player_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerSession {
    pub player_id: u64,
    pub reconnect_token: u64,
}

impl PlayerSession {
    fn mint(taken: &HashMap<u64, u64>) -> Self {
        let player_id = loop {
            let id = rand::random::<u64>();
            if !taken.contains_key(&id) {
                break id;
            }
        };
        Self {
            player_id,
            reconnect_token: rand::random(),
        }
    }
}

#[derive(Debug)]
struct PlayerConnection {
    token: u64,
    shutdown: Arc<Notify>,
}

/// Per-lobby channels and access rules.
#[derive(Clone)]
pub struct LobbyHandle {
    /// Identifier clients use to target this lobby.
    pub lobby_id: Arc<str>,
    /// Sender for game events into the lobby world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    /// Broadcast sender for raw world updates.
    pub world_tx: broadcast::Sender<WorldUpdate>,
    /// Broadcast sender for serialized world updates.
    pub world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized world update.
    pub world_latest_tx: watch::Sender<Utf8Bytes>,
    /// Watch sender for high-level server state changes.
    pub server_state_tx: watch::Sender<ServerState>,
    /// Stops the world task when the lobby is removed.
    shutdown: Arc<Notify>,
    /// Players allowed to spawn into the lobby (empty means open lobby).
    allowed_players: Arc<HashSet<u64>>,
    /// Reconnect token per issued player id.
    sessions: Arc<Mutex<HashMap<u64, u64>>>,
    /// Active socket per player id; a newer socket replaces the older one.
    player_connections: Arc<Mutex<HashMap<u64, PlayerConnection>>>,
}

impl LobbyHandle {
    /// Returns true if the provided player id should spawn in the lobby.
    pub fn is_player_allowed(&self, player_id: u64) -> bool {
        self.allowed_players.is_empty() || self.allowed_players.contains(&player_id)
    }

    /// Resumes `claim` when its token matches the one issued for that id.
    /// Any other claim, or none, gets a freshly minted session.
    pub async fn claim_session(&self, claim: Option<PlayerSession>) -> PlayerSession {
        let mut sessions = self.sessions.lock().await;
        if let Some(resumed) =
            claim.filter(|c| sessions.get(&c.player_id) == Some(&c.reconnect_token))
        {
            return resumed;
        }
        let session = PlayerSession::mint(&sessions);
        sessions.insert(session.player_id, session.reconnect_token);
        session
    }

    /// Every session issued so far, ordered by player id.
    pub async fn sessions(&self) -> Vec<PlayerSession> {
        let mut issued: Vec<PlayerSession> = self
            .sessions
            .lock()
            .await
            .iter()
            .map(|(&player_id, &reconnect_token)| PlayerSession {
                player_id,
                reconnect_token,
            })
            .collect();
        issued.sort_by_key(|s| s.player_id);
        issued
    }

    /// Claims the player slot for a new connection and signals any previous
    /// owner to close. Returns the notify the new connection should watch.
    pub async fn register_or_replace_player_connection(
        &self,
        player_id: u64,
        token: u64,
    ) -> Arc<Notify> {
        let shutdown = Arc::new(Notify::new());
        let previous = self.player_connections.lock().await.insert(
            player_id,
            PlayerConnection {
                token,
                shutdown: shutdown.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.shutdown.notify_one();
        }
        shutdown
    }

    /// Releases the player slot only if `token` still owns it.
    pub async fn unregister_player_connection_if_owner(&self, player_id: u64, token: u64) -> bool {
        let mut connections = self.player_connections.lock().await;
        match connections.get(&player_id) {
            Some(current) if current.token == token => {
                connections.remove(&player_id);
                true
            }
            _ => false,
        }
    }

    /// True while `token` owns the player slot.
    pub async fn owns_player_connection(&self, player_id: u64, token: u64) -> bool {
        self.player_connections
            .lock()
            .await
            .get(&player_id)
            .is_some_and(|c| c.token == token)
    }
}

struct LobbyEntry {
    handle: LobbyHandle,
    /// Pinned lobbies survive their last disconnect.
    pinned: bool,
    connections: usize,
}

/// Thread-safe registry for active lobbies.
pub struct LobbyRegistry {
    /// Global settings applied to newly created lobbies.
    settings: LobbySettings,
    /// Map of lobby id to active lobby.
    lobbies: RwLock<HashMap<String, LobbyEntry>>,
}

impl LobbyRegistry {
    /// Creates a new registry with the provided settings.
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            settings,
            lobbies: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new lobby and spawns its world task.
    pub async fn create_lobby(
        &self,
        lobby_id: String,
        allowed_players: HashSet<u64>,
        pinned: bool,
    ) -> Result<LobbyHandle, LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        if lobbies.contains_key(&lobby_id) {
            return Err(LobbyError::AlreadyExists);
        }

        // Build the world first so bad tuning never leaves a half-created lobby.
        let loop_settings = self.settings.loop_settings;
        let simulation = Simulation::new((*self.settings.tuning).clone(), loop_settings.tick_rate_hz)
            .map_err(LobbyError::InvalidTuning)?;

        // Channel wiring for the lobby world loop.
        let (input_tx, input_rx) = mpsc::channel::<GameEvent>(self.settings.input_channel_capacity);
        let (world_tx, _world_rx) =
            broadcast::channel::<WorldUpdate>(self.settings.world_broadcast_capacity);
        let (world_bytes_tx, _world_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.world_broadcast_capacity);
        let (world_latest_tx, _world_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let (server_state_tx, _server_state_rx) =
            watch::channel::<ServerState>(ServerState::Lobby);
        let shutdown = Arc::new(Notify::new());

        // Spawn the authoritative world loop for this lobby.
        tokio::spawn(world_task(
            input_rx,
            world_tx.clone(),
            server_state_tx.clone(),
            loop_settings,
            simulation,
            shutdown.clone(),
        ));

        let lobby = LobbyHandle {
            lobby_id: Arc::from(lobby_id.clone()),
            input_tx,
            world_tx,
            world_bytes_tx,
            world_latest_tx,
            server_state_tx,
            shutdown,
            sessions: Arc::new(Mutex::new(
                allowed_players
                    .iter()
                    .map(|&player_id| (player_id, rand::random()))
                    .collect(),
            )),
            allowed_players: Arc::new(allowed_players),
            player_connections: Arc::new(Mutex::new(HashMap::new())),
        };

        info!(lobby_id = %lobby_id, pinned, "lobby created");
        lobbies.insert(
            lobby_id,
            LobbyEntry {
                handle: lobby.clone(),
                pinned,
                connections: 0,
            },
        );
        Ok(lobby)
    }

    /// Returns a lobby handle for the provided id, if it exists.
    pub async fn get_lobby(&self, lobby_id: &str) -> Option<LobbyHandle> {
        let lobbies = self.lobbies.read().await;
        lobbies.get(lobby_id).map(|entry| entry.handle.clone())
    }

    /// Counts a new socket against the lobby. Returns the new connection
    /// count, or `None` if the lobby no longer exists.
    pub async fn register_connection(&self, lobby_id: &str) -> Option<usize> {
        let mut lobbies = self.lobbies.write().await;
        let entry = lobbies.get_mut(lobby_id)?;
        entry.connections += 1;
        Some(entry.connections)
    }

    /// Releases a socket. Unpinned lobbies are removed, and their world task
    /// stopped, when the last socket leaves.
    pub async fn register_disconnect(&self, lobby_id: &str) {
        let mut lobbies = self.lobbies.write().await;
        let Some(entry) = lobbies.get_mut(lobby_id) else {
            return;
        };
        entry.connections = entry.connections.saturating_sub(1);
        if entry.connections == 0 && !entry.pinned {
            if let Some(entry) = lobbies.remove(lobby_id) {
                entry.handle.shutdown.notify_one();
                info!(lobby_id, "lobby removed after last disconnect");
            }
        }
    }

    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }
}
