/// Gameplay tuning for the two enemy variants.

#[derive(Debug, Clone, Copy)]
pub struct MeleeTuning {
    /// Chase speed in world units per second.
    pub move_speed: f32,

    pub max_hp: i32,

    /// Distance at which contact damage lands.
    pub contact_range: f32,

    pub contact_damage: i32,

    /// Seconds between contact hits on the same cooldown.
    pub attack_interval: f32,
}

impl Default for MeleeTuning {
    fn default() -> Self {
        Self {
            move_speed: 3.5,
            max_hp: 30,
            contact_range: 0.9,
            contact_damage: 10,
            attack_interval: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RangedTuning {
    /// Kiting speed, deliberately slower than the melee chaser.
    pub move_speed: f32,

    pub max_hp: i32,

    /// Inner edge of the preferred engagement band.
    pub too_close: f32,

    /// Outer edge of the preferred engagement band.
    pub too_far: f32,

    /// Seconds between volleys.
    pub fire_interval: f32,

    pub bullet_speed: f32,

    pub bullet_damage: i32,
}

impl Default for RangedTuning {
    fn default() -> Self {
        Self {
            move_speed: 2.0,
            max_hp: 20,
            too_close: 5.0,
            too_far: 7.0,
            fire_interval: 1.2,
            bullet_speed: 8.0,
            bullet_damage: 10,
        }
    }
}

/// Angular offsets of the ranged volley around the line of sight, in degrees.
pub const VOLLEY_FAN_DEGREES: [f32; 5] = [-40.0, -20.0, 0.0, 20.0, 40.0];

/// World-space collision radius shared by both variants.
pub const ENEMY_RADIUS: f32 = 0.5;
