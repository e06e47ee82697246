/// Gameplay tuning for player characters.

use crate::domain::state::Vec2;

#[derive(Debug, Clone)]
pub struct PlayerTuning {
    /// Movement speed in world units per second.
    pub move_speed: f32,

    /// Starting and maximum hit points.
    pub max_hp: i32,

    /// World-space collision radius (server-side hit checks).
    pub radius: f32,

    /// Seconds between player shots.
    pub fire_cooldown: f32,

    /// Where players stand when the match scene starts, by display index.
    pub spawn_points: Vec<Vec2>,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            max_hp: 100,
            radius: 0.5,
            fire_cooldown: 0.25,
            spawn_points: vec![Vec2::new(-1.5, 0.0), Vec2::new(1.5, 0.0)],
        }
    }
}
