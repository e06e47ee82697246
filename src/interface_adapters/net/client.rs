use crate::domain::PlayerInput;
use crate::domain::systems::match_flow::MatchState;
use crate::interface_adapters::protocol::{
    ClientMessage, ReplicationBatchDto, ServerMessage, WorldUpdateDto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::{GameEvent, ReplicationBatch, WorldUpdate};

use futures::SinkExt;

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    WorldUpdatesClosed,
    ReplicationClosed,
    MatchStateClosed,
    JoinRequired,
    JoinTimeout,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_NAME_LEN: usize = 32;
const MAX_COLOR_LEN: usize = 16;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_COLOR: &str = "#ffffff";

pub async fn world_update_serializer(
    mut world_rx: broadcast::Receiver<WorldUpdate>,
    world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    world_latest_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each world update once and broadcast the shared bytes.
    loop {
        match world_rx.recv().await {
            Ok(update) => {
                let msg = ServerMessage::WorldUpdate(WorldUpdateDto::from(update));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize world update");
                        continue;
                    }
                };

                // Convert once and broadcast shared UTF-8 bytes to all clients.
                let bytes = Utf8Bytes::from(txt);
                // Store the latest bytes for lag recovery.
                let _ = world_latest_tx.send(bytes.clone());
                let _ = world_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    missed = n,
                    "world serializer lagged; skipping to latest update"
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("world updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub async fn replication_serializer(
    mut replication_rx: broadcast::Receiver<ReplicationBatch>,
    replication_bytes_tx: broadcast::Sender<Utf8Bytes>,
) {
    // Replication batches have no drop-and-resync fallback; a lag here is a
    // bug in the channel sizing, not something to paper over.
    loop {
        match replication_rx.recv().await {
            Ok(batch) => {
                let msg = ServerMessage::Replication(ReplicationBatchDto::from(batch));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize replication batch");
                        continue;
                    }
                };
                let _ = replication_bytes_tx.send(Utf8Bytes::from(txt));
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                error!(missed = n, "replication serializer lagged; ops lost");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("replication channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Connection id doubles as the player id; identity is connection-scoped.
    let player_id = rand_id();
    let span = info_span!("conn", player_id);
    let _enter = span.enter();

    let mut ctx = match bootstrap_connection(&mut socket, &state, player_id).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "bootstrap failed".into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    info!(display_name = %ctx.display_name, "client connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    // Serialize message safely; log JSON errors instead of panicking
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub player_id: u64,
    pub display_name: String,
    pub input_tx: mpsc::Sender<GameEvent>,
    pub world_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub world_latest_rx: watch::Receiver<Utf8Bytes>,
    pub replication_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub match_state_rx: watch::Receiver<MatchState>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_input_full_log: Instant,
    pub last_world_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &Arc<AppState>,
    player_id: u64,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates *before* doing anything else (awaits) to not miss packets.
    let world_bytes_rx = state.world_bytes_tx.subscribe();
    let world_latest_rx = state.world_latest_tx.subscribe();
    let replication_bytes_rx = state.replication_bytes_tx.subscribe();
    let match_state_rx = state.match_state_tx.subscribe();

    // The first meaningful client message must be the Join handshake.
    let (display_name, color) =
        match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
                return Err(NetError::JoinTimeout);
            }
        };

    // Send Identity Packet
    // Tell the client "This is who you are".
    let identity_msg = ServerMessage::Identity {
        player_id: player_id.to_string(),
    };
    send_message(socket, &identity_msg).await?;

    // Notify World Task
    // Join happens before the initial state so the replication sync batch can
    // include the newly claimed lobby seat.
    state
        .input_tx
        .send(GameEvent::Join {
            player_id,
            name: display_name.clone(),
            color,
        })
        .await
        .map_err(|_| NetError::InputClosed)?;

    // Send Initial State
    let initial_state = *match_state_rx.borrow();
    let state_msg = ServerMessage::MatchState(initial_state.into());
    if let Err(e) = send_message(socket, &state_msg).await {
        state
            .input_tx
            .send(GameEvent::Leave { player_id })
            .await
            .map_err(|_| NetError::InputClosed)?; // InputClosed takes precedence
        return Err(e);
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        player_id,
        display_name,
        input_tx: state.input_tx.clone(),
        world_bytes_rx,
        world_latest_rx,
        replication_bytes_rx,
        match_state_rx,
        lag_recovery_count: 0,

        msgs_in: 1,
        msgs_out: 0,
        bytes_in: 0,
        bytes_out: 0,

        invalid_json: 0,

        last_input_full_log: now,
        last_world_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<(String, String), NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let payload = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let Some(display_name) = sanitize_name(&payload.display_name) else {
                    let _ =
                        send_close_with_reason(socket, close_code::POLICY, "invalid display name")
                            .await;
                    return Err(NetError::JoinRequired);
                };
                let color = payload
                    .color
                    .as_deref()
                    .and_then(sanitize_color)
                    .unwrap_or_else(|| DEFAULT_COLOR.to_string());
                return Ok((display_name, color));
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn sanitize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_NAME_LEN {
        return None;
    }
    Some(trimmed.to_string())
}

fn sanitize_color(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_COLOR_LEN {
        return None;
    }
    Some(trimmed.to_string())
}

fn sanitize_input(mut input: PlayerInput) -> Option<PlayerInput> {
    let axes = [input.move_x, input.move_y, input.aim_x, input.aim_y];
    if axes.iter().any(|v| !v.is_finite()) {
        return None;
    }

    input.move_x = input.move_x.clamp(-1.0, 1.0);
    input.move_y = input.move_y.clamp(-1.0, 1.0);
    input.aim_x = input.aim_x.clamp(-1.0, 1.0);
    input.aim_y = input.aim_y.clamp(-1.0, 1.0);

    Some(input)
}

fn forward_event(
    player_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    event: GameEvent,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(tokio::sync::mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(last_input_full_log) {
                warn!(player_id, "input channel full; dropping event");
            }
            Ok(LoopControl::Continue)
        }
        Err(tokio::sync::mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let player_id = ctx.player_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        world_bytes_rx,
        world_latest_rx,
        replication_bytes_rx,
        match_state_rx,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        last_input_full_log,
        last_world_lag_log,
        last_invalid_input_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    player_id,
                    input_tx,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    last_input_full_log,
                    last_invalid_input_log,
                    close_frame,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing World Update
            world_msg = world_bytes_rx.recv() => {
                match world_msg {
                    Ok(bytes) => match forward_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_world_lag_log) {
                            warn!(missed = n, "world updates lagged; sending snapshot");
                        }

                        // Resync strategy: send the latest world snapshot.
                        let latest = world_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            if should_log(last_world_lag_log) {
                                warn!("world snapshot unavailable during lag recovery");
                            }
                            false
                        } else {
                            *lag_recovery_count += 1;
                            let outcome =
                                forward_bytes(latest, socket, msgs_out, bytes_out).await;

                            if should_log(last_world_lag_log) {
                                debug!(
                                    player_id,
                                    count = *lag_recovery_count,
                                    "sent lag recovery snapshot"
                                );
                            }

                            match outcome {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::WorldUpdatesClosed);
                        true
                    }
                }
            }

            // Outgoing Replication Ops
            replication_msg = replication_bytes_rx.recv() => {
                match replication_msg {
                    Ok(bytes) => match forward_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Missed ops cannot be recovered mid-stream; drop the
                        // client so a reconnect rebuilds from a sync batch.
                        warn!(player_id, missed = n, "replication stream lagged; disconnecting");
                        *close_frame = Some(CloseFrame {
                            code: close_code::AGAIN,
                            reason: "replication stream lost".into(),
                        });
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::ReplicationClosed);
                        true
                    }
                }
            }

            // Outgoing Match State
            changed_state = match_state_rx.changed() => {
                match changed_state {
                    Ok(()) => {
                        let st = *match_state_rx.borrow();
                        let msg = ServerMessage::MatchState(st.into());
                        match send_message(socket, &msg).await {
                            Ok(bytes) => {
                                *msgs_out += 1;
                                *bytes_out += bytes as u64;
                                false
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send match state");
                                true
                            }
                        }
                    }
                    Err(_) => {
                        warn!(player_id, "match state channel closed; disconnecting");
                        fatal = Some(NetError::MatchStateClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(
        player_id,
        input_tx,
        *msgs_in,
        *msgs_out,
        *bytes_in,
        *bytes_out,
        *invalid_json,
        *lag_recovery_count,
    )
    .await
    {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal {
        Err(err)
    } else {
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    player_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(_)) => {
                        // Ignore repeated Join packets after bootstrap to keep the session stable.
                        if should_log(last_invalid_input_log) {
                            warn!(player_id, "duplicate join ignored");
                        }
                        Ok(LoopControl::Continue)
                    }
                    Ok(ClientMessage::Input(input)) => {
                        let Some(input) = sanitize_input(input.into()) else {
                            if should_log(last_invalid_input_log) {
                                warn!(player_id, "invalid input values (NaN/inf); dropping");
                            }
                            return Ok(LoopControl::Continue);
                        };
                        forward_event(
                            player_id,
                            input_tx,
                            GameEvent::Input { player_id, input },
                            last_input_full_log,
                        )
                    }
                    Ok(ClientMessage::SetName { name }) => {
                        let Some(name) = sanitize_name(&name) else {
                            if should_log(last_invalid_input_log) {
                                warn!(player_id, "invalid name; dropping");
                            }
                            return Ok(LoopControl::Continue);
                        };
                        forward_event(
                            player_id,
                            input_tx,
                            GameEvent::SetName { player_id, name },
                            last_input_full_log,
                        )
                    }
                    Ok(ClientMessage::SetColor { color }) => {
                        let Some(color) = sanitize_color(&color) else {
                            if should_log(last_invalid_input_log) {
                                warn!(player_id, "invalid color; dropping");
                            }
                            return Ok(LoopControl::Continue);
                        };
                        forward_event(
                            player_id,
                            input_tx,
                            GameEvent::SetColor { player_id, color },
                            last_input_full_log,
                        )
                    }
                    Ok(ClientMessage::ToggleReady) => forward_event(
                        player_id,
                        input_tx,
                        GameEvent::ToggleReady { player_id },
                        last_input_full_log,
                    ),
                    Ok(ClientMessage::RequestRestart) => forward_event(
                        player_id,
                        input_tx,
                        GameEvent::RequestRestart { player_id },
                        last_input_full_log,
                    ),
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                player_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_bytes(
    payload: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = payload.len();
    match socket
        .send(Message::Text(payload))
        .await
        .map_err(NetError::Ws)
    {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send payload");
            LoopControl::Disconnect
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn disconnect_cleanup(
    player_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    lag_recovery_count: u64,
) -> Result<(), NetError> {
    input_tx
        .send(GameEvent::Leave { player_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        player_id,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        lag_recovery_count,
        "connection stats"
    );
    info!(player_id, "client disconnected");
    Ok(())
}
