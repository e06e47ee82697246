/// Gameplay tuning for pooled projectiles.

#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    /// Speed of player-fired bullets in world units per second.
    pub player_speed: f32,

    /// Damage of player-fired bullets.
    pub player_damage: i32,

    /// Lifetime in seconds before a live projectile is returned to the pool.
    pub lifetime: f32,

    /// Visual spin rate for spinning bullets, radians per second.
    pub spin_rate: f32,

    /// World-space collision radius.
    pub radius: f32,

    /// How many queue entries `acquire` inspects before growing the pool.
    pub max_acquire_attempts: usize,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            player_speed: 10.0,
            player_damage: 10,
            lifetime: 5.0,
            spin_rate: std::f32::consts::TAU,
            radius: 0.2,
            max_acquire_attempts: 10,
        }
    }
}
