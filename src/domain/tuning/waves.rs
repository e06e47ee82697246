/// Gameplay tuning for wave composition and pacing.

use crate::domain::state::Vec2;

/// Enemy counts spawned together for one wave.
#[derive(Debug, Clone, Copy)]
pub struct WaveComposition {
    pub melee: u32,
    pub ranged: u32,
}

#[derive(Debug, Clone)]
pub struct WaveTuning {
    /// Clearing this wave with no enemies left ends the match in victory.
    pub final_wave: u32,

    /// Seconds before the first wave spawns after the match starts.
    pub first_wave_delay: f32,

    /// Seconds between a cleared wave and the next spawn.
    pub inter_wave_delay: f32,

    /// Escalating composition, indexed by wave number - 1.
    pub waves: Vec<WaveComposition>,

    /// Fixed ring of spawn locations, consumed round-robin.
    pub spawn_points: Vec<Vec2>,
}

impl Default for WaveTuning {
    fn default() -> Self {
        // Eight points on a ring well outside the ranged engagement band.
        let spawn_points = (0..8)
            .map(|i| {
                let angle = std::f32::consts::TAU * (i as f32) / 8.0;
                Vec2::from_angle(angle) * 12.0
            })
            .collect();
        Self {
            final_wave: 3,
            first_wave_delay: 3.0,
            inter_wave_delay: 5.0,
            waves: vec![
                WaveComposition { melee: 4, ranged: 0 },
                WaveComposition { melee: 3, ranged: 2 },
                WaveComposition { melee: 5, ranged: 3 },
            ],
            spawn_points,
        }
    }
}
