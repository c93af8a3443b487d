use crate::domain::{CastRequest, PlayerInput};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::{
    ClientMessage, JoinPayload, ServerMessage, WorldUpdateDto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::{
    GameEvent, LobbyHandle, LobbyRegistry, PlayerSession, ServerState, WorldUpdate,
};

use axum::{
    Json,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use glam::Vec3;
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, field, info, info_span, warn};

const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_DISPLAY_NAME_LEN: usize = 32;
const MAX_INVALID_MESSAGES: u32 = 10;

#[derive(Debug)]
enum NetError {
    Ws(axum::Error),
    Serialization(serde_json::Error),
    // The peer broke protocol; the frame tells it why.
    Rejected(CloseFrame),
    ClosedBeforeJoin,
    InputClosed,
    FeedClosed(&'static str),
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetError::Ws(e) => write!(f, "websocket error: {e}"),
            NetError::Serialization(e) => write!(f, "serialization error: {e}"),
            NetError::Rejected(frame) => write!(f, "rejected: {}", frame.reason),
            NetError::ClosedBeforeJoin => write!(f, "closed before join"),
            NetError::InputClosed => write!(f, "world input channel closed"),
            NetError::FeedClosed(feed) => write!(f, "{feed} channel closed"),
        }
    }
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

fn policy(reason: &'static str) -> CloseFrame {
    CloseFrame {
        code: close_code::POLICY,
        reason: reason.into(),
    }
}

fn unsupported_binary() -> CloseFrame {
    CloseFrame {
        code: close_code::UNSUPPORTED,
        reason: "binary messages not supported".into(),
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct LobbyQuery {
    // The lobby id the client wants to join.
    #[serde(default)]
    lobby_id: Option<String>,
}

/// Serializes each world update once and fans the bytes out to every socket.
/// The latest bytes are also kept for clients that fall behind.
pub async fn world_update_serializer(
    mut world_rx: broadcast::Receiver<WorldUpdate>,
    world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    world_latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        let update = match world_rx.recv().await {
            Ok(update) => update,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "world serializer lagged");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("world updates closed; serializer exiting");
                return;
            }
        };
        match encode(&ServerMessage::WorldUpdate(WorldUpdateDto::from(update))) {
            Ok(bytes) => {
                world_latest_tx.send_replace(bytes.clone());
                let _ = world_bytes_tx.send(bytes);
            }
            Err(e) => error!(error = %e, "failed to serialize world update"),
        }
    }
}

pub fn spawn_lobby_serializer(lobby: &LobbyHandle) {
    tokio::spawn(world_update_serializer(
        lobby.world_tx.subscribe(),
        lobby.world_bytes_tx.clone(),
        lobby.world_latest_tx.clone(),
    ));
}

fn encode(msg: &ServerMessage) -> Result<Utf8Bytes, NetError> {
    serde_json::to_string(msg)
        .map(Utf8Bytes::from)
        .map_err(NetError::Serialization)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LobbyQuery>,
) -> impl IntoResponse {
    let lobby_id = query
        .lobby_id
        .unwrap_or_else(|| state.default_lobby_id.to_string());

    let Some(lobby) = state.lobby_registry.get_lobby(&lobby_id).await else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "lobby not found".to_string(),
            }),
        )
            .into_response();
    };

    let registry = state.lobby_registry.clone();
    ws.on_upgrade(move |socket| {
        let span = info_span!("conn", conn_id = rand_id(), player_id = field::Empty);
        serve_socket(socket, lobby, registry).instrument(span)
    })
}

// Receivers a connection reads from besides its own socket.
struct Feeds {
    world: broadcast::Receiver<Utf8Bytes>,
    latest: watch::Receiver<Utf8Bytes>,
    state: watch::Receiver<ServerState>,
}

async fn serve_socket(mut socket: WebSocket, lobby: LobbyHandle, registry: Arc<LobbyRegistry>) {
    // Subscribe before any await so updates published during the handshake reach us.
    let mut feeds = Feeds {
        world: lobby.world_bytes_tx.subscribe(),
        latest: lobby.world_latest_tx.subscribe(),
        state: lobby.server_state_tx.subscribe(),
    };

    let join = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join(&mut socket)).await {
        Ok(Ok(join)) => join,
        Ok(Err(NetError::ClosedBeforeJoin)) => {
            info!("client disconnected before join");
            return;
        }
        Ok(Err(NetError::Rejected(frame))) => {
            warn!(reason = %frame.reason, "join rejected");
            close(&mut socket, Some(frame)).await;
            return;
        }
        Ok(Err(e)) => {
            warn!(error = %e, "join failed");
            return;
        }
        Err(_) => {
            warn!("join timed out");
            close(&mut socket, Some(policy("join timeout"))).await;
            return;
        }
    };

    let session = lobby.claim_session(join.claim).await;
    let player_id = session.player_id;
    Span::current().record("player_id", player_id);

    // A later socket with the same session replaces this one.
    let conn_token = rand_id();
    let replaced = lobby
        .register_or_replace_player_connection(player_id, conn_token)
        .await;

    if registry.register_connection(&lobby.lobby_id).await.is_none() {
        lobby
            .unregister_player_connection_if_owner(player_id, conn_token)
            .await;
        warn!(lobby_id = %lobby.lobby_id, "lobby missing during connection registration");
        close(&mut socket, Some(policy("lobby unavailable"))).await;
        return;
    }

    let can_spawn = lobby.is_player_allowed(player_id);
    info!(
        display_name = %join.display_name,
        lobby_id = %lobby.lobby_id,
        can_spawn,
        "client connected"
    );

    let mut conn = Connection::new(player_id, can_spawn, lobby.input_tx.clone());
    let result = async {
        send(&mut socket, encode(&ServerMessage::from(session))?).await?;
        conn.join().await?;
        let state = feeds.state.borrow_and_update().clone();
        send(&mut socket, encode(&ServerMessage::GameState(state.into()))?).await?;
        conn.run(&mut socket, &mut feeds, &replaced).await
    }
    .await;
    if let Err(e) = &result {
        warn!(error = %e, "client loop exited with error");
    }

    // A replaced socket must not despawn the player its successor now drives.
    let still_owner = lobby
        .unregister_player_connection_if_owner(player_id, conn_token)
        .await;
    registry.register_disconnect(&lobby.lobby_id).await;
    if still_owner {
        conn.leave().await;
    }
    info!("client disconnected");
}

struct Join {
    display_name: String,
    claim: Option<PlayerSession>,
}

async fn read_join(socket: &mut WebSocket) -> Result<Join, NetError> {
    loop {
        let message = match socket.recv().await {
            Some(message) => message?,
            None => return Err(NetError::ClosedBeforeJoin),
        };
        match message {
            Message::Text(text) => return parse_join(&text),
            Message::Binary(_) => return Err(NetError::Rejected(unsupported_binary())),
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn parse_join(text: &str) -> Result<Join, NetError> {
    let payload: JoinPayload = match serde_json::from_str(text) {
        Ok(ClientMessage::Join(payload)) => payload,
        Ok(_) => return Err(NetError::Rejected(policy("join required"))),
        Err(_) => return Err(NetError::Rejected(policy("invalid join payload"))),
    };
    let display_name = payload.display_name.trim();
    if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(NetError::Rejected(policy("invalid display name")));
    }
    Ok(Join {
        display_name: display_name.to_string(),
        claim: payload.claim(),
    })
}

async fn send(socket: &mut WebSocket, bytes: Utf8Bytes) -> Result<(), NetError> {
    Ok(socket.send(Message::Text(bytes)).await?)
}

async fn close(socket: &mut WebSocket, frame: Option<CloseFrame>) {
    if let Some(frame) = frame {
        let _ = socket.send(Message::Close(Some(frame))).await;
    }
    if let Err(e) = socket.close().await {
        debug!(error = %e, "socket close error");
    }
}

// What the loop does after one select round.
#[derive(Debug)]
enum Step {
    Continue,
    Send(Utf8Bytes),
    Forward(GameEvent),
    Close(Option<CloseFrame>),
}

/// Per-socket gameplay state once the handshake is done.
struct Connection {
    player_id: u64,
    // Spectators stay connected but never drive an avatar.
    can_spawn: bool,
    joined: bool,
    invalid_messages: u32,
    input_tx: mpsc::Sender<GameEvent>,
}

impl Connection {
    fn new(player_id: u64, can_spawn: bool, input_tx: mpsc::Sender<GameEvent>) -> Self {
        Self {
            player_id,
            can_spawn,
            joined: false,
            invalid_messages: 0,
            input_tx,
        }
    }

    // Join goes out before the first GameState so the next snapshot already
    // contains the new player.
    async fn join(&mut self) -> Result<(), NetError> {
        if !self.can_spawn {
            return Ok(());
        }
        self.input_tx
            .send(GameEvent::Join {
                player_id: self.player_id,
            })
            .await
            .map_err(|_| NetError::InputClosed)?;
        self.joined = true;
        Ok(())
    }

    async fn leave(&mut self) {
        if !std::mem::take(&mut self.joined) {
            return;
        }
        let leave = GameEvent::Leave {
            player_id: self.player_id,
        };
        if self.input_tx.send(leave).await.is_err() {
            debug!("world gone before leave");
        }
    }

    async fn run(
        &mut self,
        socket: &mut WebSocket,
        feeds: &mut Feeds,
        replaced: &Notify,
    ) -> Result<(), NetError> {
        loop {
            let step = tokio::select! {
                incoming = socket.recv() => self.on_incoming(incoming),

                update = feeds.world.recv() => match update {
                    Ok(bytes) => Step::Send(bytes),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Skip what was missed and resync from the newest snapshot.
                        debug!(missed, "world updates lagged; resending latest");
                        Step::Send(feeds.latest.borrow().clone())
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(NetError::FeedClosed("world updates"));
                    }
                },

                changed = feeds.state.changed() => match changed {
                    Ok(()) => {
                        let state = feeds.state.borrow_and_update().clone();
                        Step::Send(encode(&ServerMessage::GameState(state.into()))?)
                    }
                    Err(_) => return Err(NetError::FeedClosed("server state")),
                },

                _ = replaced.notified() => {
                    info!("connection replaced by newer session");
                    Step::Close(Some(policy("connection replaced")))
                }
            };

            match step {
                Step::Continue => {}
                Step::Send(bytes) if bytes.is_empty() => {}
                Step::Send(bytes) => send(socket, bytes).await?,
                Step::Forward(event) => self.forward(event)?,
                Step::Close(frame) => {
                    close(socket, frame).await;
                    return Ok(());
                }
            }
        }
    }

    fn on_incoming(&mut self, incoming: Option<Result<Message, axum::Error>>) -> Step {
        match incoming {
            Some(Ok(Message::Text(text))) => self.on_text(&text),
            Some(Ok(Message::Binary(_))) => Step::Close(Some(unsupported_binary())),
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Step::Continue,
            Some(Ok(Message::Close(_))) | None => Step::Close(None),
            Some(Err(e)) => {
                warn!(error = %e, "websocket recv error");
                Step::Close(None)
            }
        }
    }

    fn on_text(&mut self, text: &str) -> Step {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.event_for(message).map_or(Step::Continue, Step::Forward),
            Err(e) => {
                self.invalid_messages += 1;
                debug!(bytes = text.len(), error = %e, "unparseable client message");
                if self.invalid_messages > MAX_INVALID_MESSAGES {
                    warn!("too many invalid messages; closing");
                    Step::Close(Some(policy("too many invalid messages")))
                } else {
                    Step::Continue
                }
            }
        }
    }

    fn event_for(&self, message: ClientMessage) -> Option<GameEvent> {
        let player_id = self.player_id;
        if !self.can_spawn {
            return None;
        }
        match message {
            ClientMessage::Join(_) => {
                debug!("duplicate join ignored");
                None
            }
            ClientMessage::Input(dto) => {
                let input = sanitize_input(dto.into());
                if input.is_none() {
                    debug!("non-finite input dropped");
                }
                input.map(|input| GameEvent::Input { player_id, input })
            }
            // Aim is cleaned up against the caster's position inside the world.
            ClientMessage::Cast(dto) => match CastRequest::try_from(dto) {
                Ok(request) => Some(GameEvent::Cast { player_id, request }),
                Err(unknown) => {
                    debug!(slot = unknown.0, "cast for unknown slot dropped");
                    None
                }
            },
            ClientMessage::Respawn(dto) => {
                let position = Vec3::from(dto);
                position.is_finite().then_some(GameEvent::Respawn {
                    player_id,
                    position,
                })
            }
        }
    }

    // Never blocks the socket on a slow world: a full queue drops the event.
    fn forward(&self, event: GameEvent) -> Result<(), NetError> {
        match self.input_tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("input channel full; event dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NetError::InputClosed),
        }
    }
}

fn sanitize_input(mut input: PlayerInput) -> Option<PlayerInput> {
    if !input.move_dir.is_finite() || !input.camera_yaw.is_finite() {
        return None;
    }

    input.move_dir = input.move_dir.clamp_length_max(1.0);
    input.camera_yaw = input.camera_yaw.rem_euclid(360.0);

    Some(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn connection(can_spawn: bool, capacity: usize) -> (Connection, mpsc::Receiver<GameEvent>) {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        (Connection::new(4, can_spawn, input_tx), input_rx)
    }

    #[test]
    fn when_input_is_not_finite_then_it_is_dropped() {
        let input = PlayerInput {
            move_dir: Vec2::new(f32::NAN, 0.0),
            ..Default::default()
        };

        assert!(sanitize_input(input).is_none());
    }

    #[test]
    fn sanitize_clamps_stick_and_wraps_yaw() {
        let input = PlayerInput {
            move_dir: Vec2::new(3.0, 4.0),
            camera_yaw: -90.0,
            ..Default::default()
        };

        let clean = sanitize_input(input).expect("finite input passes");

        assert!((clean.move_dir.length() - 1.0).abs() < 1e-5);
        assert_eq!(clean.camera_yaw, 270.0);
    }

    #[test]
    fn when_display_name_is_blank_or_too_long_then_join_is_rejected() {
        let long = "x".repeat(MAX_DISPLAY_NAME_LEN + 1);
        for name in ["   ", long.as_str()] {
            let text = serde_json::json!({ "type": "Join", "data": { "display_name": name } });

            assert!(matches!(
                parse_join(&text.to_string()),
                Err(NetError::Rejected(frame)) if frame.reason.as_str() == "invalid display name"
            ));
        }
    }

    #[test]
    fn when_first_message_is_not_join_then_join_is_required() {
        let result = parse_join(r#"{"type":"Input","data":{"jump":true}}"#);

        assert!(matches!(
            result,
            Err(NetError::Rejected(frame)) if frame.reason.as_str() == "join required"
        ));
    }

    #[test]
    fn join_name_is_trimmed() {
        let join = parse_join(r#"{"type":"Join","data":{"display_name":"  ana "}}"#)
            .expect("valid join");

        assert_eq!(join.display_name, "ana");
        assert!(join.claim.is_none());
    }

    #[test]
    fn spectator_messages_never_reach_the_world() {
        let (mut conn, mut input_rx) = connection(false, 4);

        let step = conn.on_text(r#"{"type":"Input","data":{"jump":true}}"#);

        assert!(matches!(step, Step::Continue));
        assert!(input_rx.try_recv().is_err());
    }

    #[test]
    fn cast_messages_become_game_events() {
        let (mut conn, _input_rx) = connection(true, 4);

        let step = conn.on_text(
            r#"{"type":"Cast","data":{"slot":1,"spawn_position":[0,1,1],"direction":[0,0,1]}}"#,
        );

        assert!(matches!(
            step,
            Step::Forward(GameEvent::Cast { player_id: 4, .. })
        ));
    }

    #[test]
    fn when_respawn_point_is_not_finite_then_it_is_dropped() {
        let (conn, _input_rx) = connection(true, 4);
        let message = ClientMessage::Respawn(
            serde_json::from_str(r#"{"x":1e39,"y":0,"z":0}"#).expect("respawn dto"),
        );

        assert!(conn.event_for(message).is_none());
    }

    #[test]
    fn when_invalid_message_budget_is_spent_then_connection_closes() {
        let (mut conn, _input_rx) = connection(true, 4);

        for _ in 0..MAX_INVALID_MESSAGES {
            assert!(matches!(conn.on_text("not json"), Step::Continue));
        }
        // Valid traffic does not refill the budget.
        assert!(matches!(
            conn.on_text(r#"{"type":"Input","data":{}}"#),
            Step::Forward(_)
        ));

        match conn.on_text("{") {
            Step::Close(Some(frame)) => assert_eq!(frame.code, close_code::POLICY),
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[test]
    fn binary_frames_close_as_unsupported() {
        let (mut conn, _input_rx) = connection(true, 4);

        let step = conn.on_incoming(Some(Ok(Message::Binary(Vec::new().into()))));

        match step {
            Step::Close(Some(frame)) => assert_eq!(frame.code, close_code::UNSUPPORTED),
            other => panic!("expected close, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn when_input_channel_is_full_then_events_are_dropped_not_fatal() {
        let (conn, mut input_rx) = connection(true, 1);
        let input = || GameEvent::Input {
            player_id: 4,
            input: PlayerInput::default(),
        };

        assert!(conn.forward(input()).is_ok());
        assert!(conn.forward(input()).is_ok());
        assert!(input_rx.try_recv().is_ok());
        assert!(input_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn when_world_is_gone_then_forwarding_fails() {
        let (conn, input_rx) = connection(true, 1);
        drop(input_rx);

        assert!(matches!(
            conn.forward(GameEvent::Leave { player_id: 4 }),
            Err(NetError::InputClosed)
        ));
    }

    #[tokio::test]
    async fn spectators_never_send_join_or_leave() {
        let (mut conn, mut input_rx) = connection(false, 4);

        conn.join().await.expect("nothing to send");
        conn.leave().await;

        assert!(input_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn joined_players_leave_once() {
        let (mut conn, mut input_rx) = connection(true, 4);

        conn.join().await.expect("world accepts join");
        conn.leave().await;
        conn.leave().await;

        assert!(matches!(input_rx.try_recv(), Ok(GameEvent::Join { player_id: 4 })));
        assert!(matches!(input_rx.try_recv(), Ok(GameEvent::Leave { player_id: 4 })));
        assert!(input_rx.try_recv().is_err());
    }
}
