use crate::domain::systems::match_flow::MatchState;
use crate::interface_adapters::clients::highscores::HighscoreClient;
use crate::use_cases::{GameEvent, ReplicationBatch, WorldUpdate};
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Inputs flowing from the network into the game loop.
    pub input_tx: mpsc::Sender<GameEvent>,
    // World updates produced by the game loop (domain structs).
    pub world_tx: broadcast::Sender<WorldUpdate>,
    // Serialized world updates, shared across all connections.
    pub world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Latest serialized world update for lag recovery.
    pub world_latest_tx: watch::Sender<Utf8Bytes>,
    // Replication op batches produced by the game loop.
    pub replication_tx: broadcast::Sender<ReplicationBatch>,
    // Serialized replication batches, shared across all connections.
    pub replication_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Match lifecycle state (lobby/playing/terminal).
    pub match_state_tx: watch::Sender<MatchState>,
    // Score backend, absent when unconfigured.
    pub highscores: Option<Arc<HighscoreClient>>,
}
