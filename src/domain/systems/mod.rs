// Authoritative simulation systems, run once per fixed tick.

pub mod enemy_ai;
pub mod match_flow;
pub mod projectiles;
pub mod score;
pub mod spawner;
