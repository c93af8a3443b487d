mod support;

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// Read text frames until one with the given `type` tag arrives.
async fn next_of_type(socket: &mut Socket, kind: &str) -> serde_json::Value {
    loop {
        let msg = socket
            .next()
            .await
            .expect("socket stays open")
            .expect("frame is readable");
        let Ok(text) = msg.to_text() else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
            continue;
        };
        if value["type"] == kind {
            return value;
        }
    }
}

// Join the default lobby, optionally claiming an earlier identity.
async fn join(display_name: &str, claim: Option<(&str, &str)>) -> Socket {
    let (mut socket, _) = connect_async(support::ws_url(None))
        .await
        .expect("websocket connects");
    let (player_id, reconnect_token) = claim.unzip();
    let join = serde_json::json!({
        "type": "Join",
        "data": {
            "display_name": display_name,
            "player_id": player_id,
            "reconnect_token": reconnect_token,
        }
    });
    socket
        .send(Message::text(join.to_string()))
        .await
        .expect("join is sent");
    socket
}

// Wait for the Identity message and return (player_id, reconnect_token).
async fn identity(socket: &mut Socket) -> (String, String) {
    let identity = tokio::time::timeout(Duration::from_secs(5), next_of_type(socket, "Identity"))
        .await
        .expect("identity arrives");
    let field = |name: &str| {
        identity["data"][name]
            .as_str()
            .expect("identity fields are strings")
            .to_string()
    };
    (field("player_id"), field("reconnect_token"))
}

#[tokio::test]
async fn when_client_joins_then_it_receives_identity_and_sees_itself() {
    let mut socket = join("ana", None).await;
    let (player_id, _) = identity(&mut socket).await;

    let seen = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let update = next_of_type(&mut socket, "WorldUpdate").await;
            let players = update["data"]["players"].as_array().cloned().unwrap_or_default();
            if let Some(me) = players.iter().find(|p| p["player_id"] == player_id.as_str()) {
                return me.clone();
            }
        }
    })
    .await
    .expect("own player appears in a world update");

    assert_eq!(seen["is_dead"], false);
    assert_eq!(seen["max_health"], 100.0);
}

#[tokio::test]
async fn when_second_socket_claims_a_live_id_without_its_token_then_it_gets_a_new_identity() {
    let mut first = join("ana", None).await;
    let (first_id, first_token) = identity(&mut first).await;

    let forged = format!("{first_token}0");
    let mut second = join("eve", Some((first_id.as_str(), forged.as_str()))).await;
    let (second_id, second_token) = identity(&mut second).await;
    let mut third = join("mallory", Some((first_id.as_str(), ""))).await;
    let (third_id, _) = identity(&mut third).await;

    assert_ne!(second_id, first_id);
    assert_ne!(third_id, first_id);
    assert_ne!(second_token, first_token);

    // The original socket keeps receiving updates instead of being replaced.
    tokio::time::timeout(Duration::from_secs(5), next_of_type(&mut first, "WorldUpdate"))
        .await
        .expect("first socket is still served");
}

#[tokio::test]
async fn when_client_resumes_with_its_token_then_the_old_socket_is_replaced() {
    let mut first = join("ana", None).await;
    let (player_id, token) = identity(&mut first).await;

    let mut second = join("ana", Some((player_id.as_str(), token.as_str()))).await;
    let (resumed_id, resumed_token) = identity(&mut second).await;

    assert_eq!(resumed_id, player_id);
    assert_eq!(resumed_token, token);

    let reason = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match first.next().await {
                Some(Ok(Message::Close(frame))) => {
                    return frame.map(|f| f.reason.to_string()).unwrap_or_default();
                }
                None | Some(Err(_)) => return String::new(),
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("old socket is closed");

    assert_eq!(reason, "connection replaced");
}

#[tokio::test]
async fn when_first_message_is_not_join_then_connection_is_closed() {
    let (mut socket, _) = connect_async(support::ws_url(None))
        .await
        .expect("websocket connects");
    let input = serde_json::json!({ "type": "Input", "data": { "jump": true } });
    socket
        .send(Message::text(input.to_string()))
        .await
        .expect("input is sent");

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("server closes the socket");

    assert!(closed);
}

#[tokio::test]
async fn when_lobby_is_unknown_then_upgrade_is_refused() {
    let result = connect_async(support::ws_url(Some("no-such-lobby"))).await;

    assert!(result.is_err());
}
