use crate::interface_adapters::http::{ErrorResponse, HealthResponse};
use crate::interface_adapters::net::client::spawn_lobby_serializer;
use crate::interface_adapters::state::AppState;
use crate::use_cases::LobbyError;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::{collections::HashSet, sync::Arc};
use tracing::error;

#[derive(Debug, serde::Deserialize)]
pub struct LobbyInitRequest {
    // Lobby id chosen by the caller (matchmaker or operator).
    lobby_id: String,
    // Player ids that are allowed to spawn into the lobby.
    #[serde(default)]
    allowed_player_ids: Vec<u64>,
}

#[derive(Debug, serde::Serialize)]
struct LobbyInitResponse {
    // The lobby id that was created.
    lobby_id: String,
    // One session per allowed player, handed to that player for its Join.
    sessions: Vec<SessionDto>,
}

#[derive(Debug, serde::Serialize)]
struct SessionDto {
    player_id: String,
    reconnect_token: String,
}

fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

pub async fn create_lobby_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LobbyInitRequest>,
) -> impl IntoResponse {
    let lobby_id = payload.lobby_id.trim().to_string();
    if lobby_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "lobby_id is required");
    }

    let allowed_players: HashSet<u64> = payload.allowed_player_ids.into_iter().collect();

    // Created lobbies are not pinned and will be removed on last disconnect.
    match state
        .lobby_registry
        .create_lobby(lobby_id.clone(), allowed_players, false)
        .await
    {
        Ok(lobby) => {
            // Create serializers so clients can subscribe immediately.
            spawn_lobby_serializer(&lobby);
            let sessions = lobby
                .sessions()
                .await
                .into_iter()
                .map(|s| SessionDto {
                    player_id: s.player_id.to_string(),
                    reconnect_token: s.reconnect_token.to_string(),
                })
                .collect();
            (
                StatusCode::CREATED,
                Json(LobbyInitResponse { lobby_id, sessions }),
            )
                .into_response()
        }
        Err(LobbyError::AlreadyExists) => {
            error_response(StatusCode::CONFLICT, "lobby already exists")
        }
        Err(LobbyError::InvalidTuning(e)) => {
            error!(lobby_id = %lobby_id, error = %e, "lobby world rejected tuning");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "lobby could not be created")
        }
    }
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        lobbies: state.lobby_registry.lobby_count().await,
    })
}
