// Use cases layer: application workflows for the arena server.

pub mod game;
pub mod lobby;
pub mod prediction;
pub mod types;

pub use game::{LoopSettings, Simulation, TickReport};
pub use lobby::{LobbyError, LobbyHandle, LobbyRegistry, LobbySettings, PlayerSession};
pub use prediction::CastPredictor;
pub use types::{GameEvent, ServerState, WorldUpdate};
