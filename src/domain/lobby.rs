// Lobby roster: replicated player slots with name, color, and ready flag.
// The match starts once the room is full and everyone is ready.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::replication::{ReplicatedMap, ReplicationBus, ReplicationOp};

/// Errors returned by roster operations.
#[derive(Debug, PartialEq, Eq)]
pub enum LobbyError {
    /// Room already holds the maximum number of players.
    RoomFull,
    /// The connection already occupies a slot.
    AlreadyRegistered,
    /// No slot exists for the connection.
    NotRegistered,
}

/// One occupied slot, replicated as a unit whenever any field changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbySlot {
    pub connection_id: u64,
    /// Stable 0-based seat index, assigned at registration.
    pub display_index: usize,
    pub name: String,
    pub color: String,
    pub ready: bool,
}

pub struct LobbyRoster {
    slots: ReplicatedMap<u64, LobbySlot>,
    max_players: usize,
}

impl LobbyRoster {
    pub fn new(max_players: usize) -> Self {
        Self {
            slots: ReplicatedMap::new("lobby.slots"),
            max_players,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.max_players
    }

    pub fn slot(&self, connection_id: u64) -> Option<&LobbySlot> {
        self.slots.get(&connection_id)
    }

    pub fn slots(&self) -> impl Iterator<Item = &LobbySlot> {
        self.slots.values()
    }

    /// Claims the next seat for a connection. Seat order follows arrival.
    pub fn register(
        &mut self,
        connection_id: u64,
        name: String,
        color: String,
        bus: &mut ReplicationBus,
    ) -> Result<(), LobbyError> {
        if self.slots.get(&connection_id).is_some() {
            return Err(LobbyError::AlreadyRegistered);
        }
        if self.is_full() {
            return Err(LobbyError::RoomFull);
        }

        let slot = LobbySlot {
            connection_id,
            display_index: self.slots.len(),
            name: name.clone(),
            color,
            ready: false,
        };
        let _ = self.slots.insert(connection_id, slot, bus);
        info!(connection_id, %name, "player registered");
        Ok(())
    }

    pub fn set_name(
        &mut self,
        connection_id: u64,
        name: String,
        bus: &mut ReplicationBus,
    ) -> Result<(), LobbyError> {
        self.update_slot(connection_id, bus, |slot| slot.name = name)
    }

    pub fn set_color(
        &mut self,
        connection_id: u64,
        color: String,
        bus: &mut ReplicationBus,
    ) -> Result<(), LobbyError> {
        self.update_slot(connection_id, bus, |slot| slot.color = color)
    }

    /// Flips the ready flag and returns its new value.
    pub fn toggle_ready(
        &mut self,
        connection_id: u64,
        bus: &mut ReplicationBus,
    ) -> Result<bool, LobbyError> {
        let mut ready = false;
        self.update_slot(connection_id, bus, |slot| {
            slot.ready = !slot.ready;
            ready = slot.ready;
        })?;
        Ok(ready)
    }

    pub fn remove(
        &mut self,
        connection_id: u64,
        bus: &mut ReplicationBus,
    ) -> Result<LobbySlot, LobbyError> {
        self.slots
            .remove(&connection_id, bus)
            .map_err(|_| LobbyError::NotRegistered)?
            .ok_or(LobbyError::NotRegistered)
    }

    /// True when the room is full and every occupant has readied up.
    pub fn all_ready(&self) -> bool {
        self.is_full() && self.slots.values().all(|slot| slot.ready)
    }

    pub fn sync_ops(&self) -> Vec<ReplicationOp> {
        self.slots.sync_ops()
    }

    fn update_slot(
        &mut self,
        connection_id: u64,
        bus: &mut ReplicationBus,
        mutate: impl FnOnce(&mut LobbySlot),
    ) -> Result<(), LobbyError> {
        let mut slot = self
            .slots
            .get(&connection_id)
            .cloned()
            .ok_or(LobbyError::NotRegistered)?;
        mutate(&mut slot);
        let _ = self.slots.insert(connection_id, slot, bus);
        Ok(())
    }
}
