/// Gameplay tuning for the score ledger.

#[derive(Debug, Clone, Copy)]
pub struct ScoreTuning {
    /// Team and individual points per enemy kill.
    pub kill_reward: i64,

    /// Team points per cleared wave.
    pub wave_clear_bonus: i64,
}

impl Default for ScoreTuning {
    fn default() -> Self {
        Self {
            kill_reward: 10,
            wave_clear_bonus: 50,
        }
    }
}
