// Wire protocol DTOs and conversions for public arena server messages.
// Internal service-to-service DTOs should live outside this module.

use crate::domain::replication::ReplicationOp;
use crate::domain::systems::match_flow::MatchState;
use crate::domain::{EnemyKind, EnemySnapshot, Faction, PlayerInput, PlayerSnapshot, ProjectileSnapshot};
use crate::use_cases::{ReplicationBatch, WorldUpdate};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity for the connection after Join is accepted.
    Identity { player_id: String },
    // Snapshot of the world for a given tick.
    WorldUpdate(WorldUpdateDto),
    // Replicated-state mutations issued during one tick, in write order.
    Replication(ReplicationBatchDto),
    // Match lifecycle transitions (lobby, playing, terminal screens).
    MatchState(MatchStateDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message with identity metadata.
    Join(JoinPayload),
    // Input messages sent after a successful Join.
    Input(PlayerInputDto),
    // Lobby slot edits.
    SetName { name: String },
    SetColor { color: String },
    ToggleReady,
    // Back to the lobby after a terminal screen.
    RequestRestart,
}

/// Payload for the Join handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub display_name: String,
    /// Preferred slot color; the server default applies when omitted.
    #[serde(default)]
    pub color: Option<String>,
}

/// Per-tick input payload sent by the client after joining.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerInputDto {
    #[serde(default)]
    pub move_x: f32,
    #[serde(default)]
    pub move_y: f32,
    #[serde(default)]
    pub aim_x: f32,
    #[serde(default)]
    pub aim_y: f32,
    #[serde(default)]
    pub shoot: bool,
}

impl From<PlayerInputDto> for PlayerInput {
    fn from(input: PlayerInputDto) -> Self {
        Self {
            move_x: input.move_x,
            move_y: input.move_y,
            aim_x: input.aim_x,
            aim_y: input.aim_y,
            shoot: input.shoot,
        }
    }
}

/// Snapshot of the world sent to clients on each tick.
#[derive(Debug, Clone, Serialize)]
pub struct WorldUpdateDto {
    pub tick: u64,
    pub players: Vec<PlayerStateDto>,
    pub enemies: Vec<EnemyStateDto>,
    #[serde(default)]
    pub projectiles: Vec<ProjectileStateDto>,
}

impl From<WorldUpdate> for WorldUpdateDto {
    fn from(update: WorldUpdate) -> Self {
        Self {
            tick: update.tick,
            players: update.players.iter().map(PlayerStateDto::from).collect(),
            enemies: update.enemies.iter().map(EnemyStateDto::from).collect(),
            projectiles: update
                .projectiles
                .iter()
                .map(ProjectileStateDto::from)
                .collect(),
        }
    }
}

/// Flattened player state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStateDto {
    pub id: String,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub hp: i32,
    pub alive: bool,
}

impl From<&PlayerSnapshot> for PlayerStateDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            id: player.id.to_string(),
            name: player.name.clone(),
            color: player.color.clone(),
            x: player.x,
            y: player.y,
            rot: player.rot,
            hp: player.hp,
            alive: player.alive,
        }
    }
}

/// Flattened enemy state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct EnemyStateDto {
    pub id: String,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub hp: i32,
}

impl From<&EnemySnapshot> for EnemyStateDto {
    fn from(enemy: &EnemySnapshot) -> Self {
        Self {
            id: enemy.id.to_string(),
            kind: enemy.kind,
            x: enemy.x,
            y: enemy.y,
            rot: enemy.rot,
            hp: enemy.hp,
        }
    }
}

/// Flattened projectile state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectileStateDto {
    pub id: String,
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
}

impl From<&ProjectileSnapshot> for ProjectileStateDto {
    fn from(projectile: &ProjectileSnapshot) -> Self {
        Self {
            id: projectile.id.to_string(),
            faction: projectile.faction,
            x: projectile.x,
            y: projectile.y,
            rot: projectile.rot,
        }
    }
}

/// Ordered replication ops for one tick. Ops reuse the storage-level schema;
/// clients apply them to their replicated containers in order.
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationBatchDto {
    pub tick: u64,
    pub ops: Vec<ReplicationOp>,
}

impl From<ReplicationBatch> for ReplicationBatchDto {
    fn from(batch: ReplicationBatch) -> Self {
        Self {
            tick: batch.tick,
            ops: batch.ops,
        }
    }
}

/// Match lifecycle state sent to clients for UI flow.
#[derive(Debug, Clone, Serialize)]
pub enum MatchStateDto {
    Lobby,
    Playing,
    GameOver,
    Victory,
}

impl From<MatchState> for MatchStateDto {
    fn from(state: MatchState) -> Self {
        match state {
            MatchState::Lobby => MatchStateDto::Lobby,
            MatchState::Playing => MatchStateDto::Playing,
            MatchState::GameOver => MatchStateDto::GameOver,
            MatchState::Victory => MatchStateDto::Victory,
        }
    }
}
