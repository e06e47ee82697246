// Use cases layer: application workflows for the arena server.

pub mod game;
pub mod scene;
pub mod types;

pub use game::{world_task, WorldSettings};
pub use types::{GameEvent, ReplicationBatch, WorldUpdate};
