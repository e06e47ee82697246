mod support;

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect_and_join(base_url: &str, display_name: &str) -> WsStream {
    let ws_url = format!("{}/ws", base_url.replace("http://", "ws://"));
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("websocket connect");

    let join = serde_json::json!({
        "type": "Join",
        "data": { "display_name": display_name }
    });
    ws.send(Message::Text(join.to_string().into()))
        .await
        .expect("send join");
    ws
}

/// Reads server messages until one matches, skipping the world update spam.
async fn recv_until<F>(ws: &mut WsStream, mut matches: F) -> serde_json::Value
where
    F: FnMut(&serde_json::Value) -> bool,
{
    timeout(RECV_TIMEOUT, async {
        loop {
            let msg = ws
                .next()
                .await
                .expect("stream open")
                .expect("websocket recv");
            let Message::Text(text) = msg else { continue };
            let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                continue;
            };
            if matches(&value) {
                return value;
            }
        }
    })
    .await
    .expect("expected message before timeout")
}

#[tokio::test]
async fn join_handshake_yields_identity_then_match_state() {
    let base_url = support::ensure_server();
    let mut ws = connect_and_join(base_url, "handshake").await;

    let identity = recv_until(&mut ws, |v| v["type"] == "Identity").await;
    let player_id = identity["data"]["player_id"]
        .as_str()
        .expect("identity carries a player id");
    assert!(player_id.parse::<u64>().is_ok());

    let state = recv_until(&mut ws, |v| v["type"] == "MatchState").await;
    assert_eq!(state["data"], serde_json::json!("Lobby"));
}

#[tokio::test]
async fn joining_replicates_a_lobby_slot() {
    let base_url = support::ensure_server();
    let mut ws = connect_and_join(base_url, "seatcheck").await;

    // The sync batch after Join rebuilds the roster for this observer.
    let batch = recv_until(&mut ws, |v| {
        v["type"] == "Replication"
            && v["data"]["ops"]
                .as_array()
                .is_some_and(|ops| {
                    ops.iter().any(|op| {
                        op["channel"] == "lobby.slots"
                            && op["value"]["name"] == "seatcheck"
                    })
                })
    })
    .await;

    let ops = batch["data"]["ops"].as_array().expect("ops array");
    let slot = ops
        .iter()
        .find(|op| op["channel"] == "lobby.slots" && op["value"]["name"] == "seatcheck")
        .expect("slot op present");
    assert_eq!(slot["value"]["ready"], serde_json::json!(false));
}

#[tokio::test]
async fn ready_toggle_is_replicated_to_the_toggling_client() {
    let base_url = support::ensure_server();
    let mut ws = connect_and_join(base_url, "readycheck").await;

    // Wait for our own seat before toggling.
    recv_until(&mut ws, |v| {
        v["type"] == "Replication"
            && v["data"]["ops"].as_array().is_some_and(|ops| {
                ops.iter()
                    .any(|op| op["value"]["name"] == "readycheck")
            })
    })
    .await;

    let toggle = serde_json::json!({ "type": "ToggleReady" });
    ws.send(Message::Text(toggle.to_string().into()))
        .await
        .expect("send toggle");

    recv_until(&mut ws, |v| {
        v["type"] == "Replication"
            && v["data"]["ops"].as_array().is_some_and(|ops| {
                ops.iter().any(|op| {
                    op["channel"] == "lobby.slots"
                        && op["value"]["name"] == "readycheck"
                        && op["value"]["ready"] == serde_json::json!(true)
                })
            })
    })
    .await;

    // Toggle back so this test never contributes to a match start.
    ws.send(Message::Text(toggle.to_string().into()))
        .await
        .expect("send toggle");
}

#[tokio::test]
async fn input_before_join_is_rejected() {
    let base_url = support::ensure_server();
    let ws_url = format!("{}/ws", base_url.replace("http://", "ws://"));
    let (mut ws, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("websocket connect");

    let input = serde_json::json!({
        "type": "Input",
        "data": { "move_x": 1.0, "shoot": false }
    });
    ws.send(Message::Text(input.to_string().into()))
        .await
        .expect("send input");

    // The server closes the socket instead of handing out an identity.
    let closed = timeout(RECV_TIMEOUT, async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => return true,
                _ => {}
            }
        }
        true
    })
    .await
    .expect("close before timeout");
    assert!(closed);
}
