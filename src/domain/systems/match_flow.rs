// Match state machine: lobby readiness flows into Playing, which resolves
// into GameOver or Victory. Terminal states latch until an explicit restart
// tears the session down.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::replication::{ReplicatedValue, ReplicationBus, ReplicationOp};
use crate::domain::state::PlayerActor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchState {
    Lobby,
    Playing,
    GameOver,
    Victory,
}

pub struct MatchFlow {
    state: ReplicatedValue<MatchState>,
    final_wave: u32,
}

impl MatchFlow {
    pub fn new(final_wave: u32) -> Self {
        Self {
            state: ReplicatedValue::new("match.state", MatchState::Lobby),
            final_wave,
        }
    }

    pub fn state(&self) -> MatchState {
        *self.state.get()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == MatchState::Playing
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state(), MatchState::GameOver | MatchState::Victory)
    }

    /// Lobby → Playing, triggered by the lobby countdown completing.
    pub fn begin_playing(&mut self, bus: &mut ReplicationBus) {
        if self.state() != MatchState::Lobby {
            return;
        }
        let _ = self.state.set(MatchState::Playing, bus);
        info!("match started");
    }

    /// Win/loss poll, run at the lower-frequency cadence while Playing.
    /// GameOver is evaluated first and wins a simultaneous tick: a team wipe
    /// is never overridden by the victory check.
    pub fn evaluate(
        &mut self,
        players: &[PlayerActor],
        enemy_count: usize,
        current_wave: u32,
        wave_active: bool,
        bus: &mut ReplicationBus,
    ) {
        if self.state() != MatchState::Playing {
            return;
        }

        let wiped = players.is_empty() || players.iter().all(|p| !p.alive);
        if wiped {
            let _ = self.state.set(MatchState::GameOver, bus);
            info!("game over: no players remaining");
            return;
        }

        if current_wave >= self.final_wave && !wave_active && enemy_count == 0 {
            let _ = self.state.set(MatchState::Victory, bus);
            info!(wave = current_wave, "victory");
        }
    }

    pub fn sync_ops(&self) -> Vec<ReplicationOp> {
        vec![self.state.sync_op()]
    }
}
