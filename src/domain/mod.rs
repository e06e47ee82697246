// Domain layer: authoritative simulation types and rules.

pub mod lobby;
pub mod replication;
pub mod state;
pub mod systems;
pub mod timer;
pub mod tuning;

pub use replication::{AuthorityViolation, ReplicatedMap, ReplicatedValue, ReplicationBus};
pub use state::{
    EnemyBody, EnemyKind, EnemySnapshot, Faction, PlayerActor, PlayerInput, PlayerSnapshot,
    ProjectileSnapshot, Vec2,
};
