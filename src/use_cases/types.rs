// Use-case level inputs/outputs for the game loop.

use crate::domain::replication::ReplicationOp;
use crate::domain::{EnemySnapshot, PlayerInput, PlayerSnapshot, ProjectileSnapshot};

#[derive(Debug, Clone)]
pub enum GameEvent {
    Join { player_id: u64, name: String, color: String },
    Leave { player_id: u64 },
    Input { player_id: u64, input: PlayerInput },
    SetName { player_id: u64, name: String },
    SetColor { player_id: u64, color: String },
    ToggleReady { player_id: u64 },
    RequestRestart { player_id: u64 },
}

/// Per-tick transform/health snapshot for everything that moves.
#[derive(Debug, Clone)]
pub struct WorldUpdate {
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub enemies: Vec<EnemySnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

/// Replicated-state mutations issued during one tick, in write order.
#[derive(Debug, Clone)]
pub struct ReplicationBatch {
    pub tick: u64,
    pub ops: Vec<ReplicationOp>,
}
