// Gameplay tuning, separate from runtime/server configuration.

pub mod enemy;
pub mod player;
pub mod projectile;
pub mod score;
pub mod waves;
