// Wave director: timed wave composition, spawn-point selection, wave-active
// tracking, and the inter-wave delay countdown.

use tracing::info;

use crate::domain::replication::{ReplicatedValue, ReplicationBus, ReplicationOp};
use crate::domain::state::{EnemyKind, Vec2};
use crate::domain::systems::enemy_ai::Enemy;
use crate::domain::timer::{CountdownStep, SecondCountdown};
use crate::domain::tuning::waves::WaveTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectorPhase {
    /// Match has not started.
    Idle,
    /// Counting down to the next spawn.
    Delay,
    /// Spawned enemies of the current wave are still alive.
    Active,
    /// The final wave has been cleared.
    Exhausted,
}

pub struct WaveDirector {
    tuning: WaveTuning,
    phase: DirectorPhase,
    delay: SecondCountdown,
    next_spawn_point: usize,
    next_enemy_id: u64,

    // Replicated so observers can drive wave banners and countdowns.
    wave: ReplicatedValue<u32>,
    wave_active: ReplicatedValue<bool>,
    countdown: ReplicatedValue<u32>,
}

impl WaveDirector {
    pub fn new(tuning: WaveTuning) -> Self {
        Self {
            tuning,
            phase: DirectorPhase::Idle,
            delay: SecondCountdown::new(0.0),
            next_spawn_point: 0,
            next_enemy_id: 1,
            wave: ReplicatedValue::new("wave.current", 0),
            wave_active: ReplicatedValue::new("wave.active", false),
            countdown: ReplicatedValue::new("wave.countdown", 0),
        }
    }

    /// 1-based wave number; 0 before the first spawn. Monotonic for a match.
    pub fn current_wave(&self) -> u32 {
        *self.wave.get()
    }

    pub fn is_wave_active(&self) -> bool {
        *self.wave_active.get()
    }

    pub fn final_wave(&self) -> u32 {
        self.tuning.final_wave
    }

    pub fn begin_match(&mut self, bus: &mut ReplicationBus) {
        self.phase = DirectorPhase::Delay;
        self.delay = SecondCountdown::new(self.tuning.first_wave_delay);
        let _ = self.countdown.set(self.delay.seconds_remaining(), bus);
        info!(first_wave_delay = self.tuning.first_wave_delay, "wave director armed");
    }

    /// Advances the director one fixed step. Returns the wave number on the
    /// tick its last enemy died (the active→inactive completion edge), so
    /// the caller can award the clear bonus exactly once.
    pub fn tick(
        &mut self,
        enemies: &mut Vec<Enemy>,
        bus: &mut ReplicationBus,
        dt: f32,
    ) -> Option<u32> {
        match self.phase {
            DirectorPhase::Idle | DirectorPhase::Exhausted => None,
            DirectorPhase::Delay => {
                match self.delay.advance(dt) {
                    CountdownStep::Pending => {}
                    CountdownStep::SecondElapsed(seconds) => {
                        let _ = self.countdown.set(seconds, bus);
                    }
                    CountdownStep::Finished => {
                        let _ = self.countdown.set(0, bus);
                        self.spawn_next_wave(enemies, bus);
                    }
                }
                None
            }
            DirectorPhase::Active => {
                if !enemies.is_empty() {
                    return None;
                }
                let cleared = self.current_wave();
                let _ = self.wave_active.set(false, bus);
                if cleared >= self.tuning.final_wave {
                    self.phase = DirectorPhase::Exhausted;
                    info!(wave = cleared, "final wave cleared");
                } else {
                    self.phase = DirectorPhase::Delay;
                    self.delay = SecondCountdown::new(self.tuning.inter_wave_delay);
                    let _ = self.countdown.set(self.delay.seconds_remaining(), bus);
                    info!(wave = cleared, "wave cleared; next wave pending");
                }
                Some(cleared)
            }
        }
    }

    fn spawn_next_wave(&mut self, enemies: &mut Vec<Enemy>, bus: &mut ReplicationBus) {
        let wave_number = self.current_wave() + 1;
        let composition = self
            .tuning
            .waves
            .get((wave_number - 1) as usize)
            .copied()
            .unwrap_or_else(|| {
                // Schedules shorter than final_wave repeat their last entry.
                self.tuning
                    .waves
                    .last()
                    .copied()
                    .unwrap_or(crate::domain::tuning::waves::WaveComposition { melee: 1, ranged: 0 })
            });

        for _ in 0..composition.melee {
            let pos = self.take_spawn_point();
            enemies.push(Enemy::spawn(self.take_enemy_id(), EnemyKind::Melee, pos));
        }
        for _ in 0..composition.ranged {
            let pos = self.take_spawn_point();
            enemies.push(Enemy::spawn(self.take_enemy_id(), EnemyKind::Ranged, pos));
        }

        let _ = self.wave.set(wave_number, bus);
        let _ = self.wave_active.set(true, bus);
        self.phase = DirectorPhase::Active;
        info!(
            wave = wave_number,
            melee = composition.melee,
            ranged = composition.ranged,
            "wave spawned"
        );
    }

    fn take_spawn_point(&mut self) -> Vec2 {
        let points = &self.tuning.spawn_points;
        if points.is_empty() {
            return Vec2::ZERO;
        }
        let pos = points[self.next_spawn_point % points.len()];
        self.next_spawn_point += 1;
        pos
    }

    fn take_enemy_id(&mut self) -> u64 {
        let id = self.next_enemy_id;
        self.next_enemy_id += 1;
        id
    }

    /// Ops that rebuild the director's replicated fields on a late joiner.
    pub fn sync_ops(&self) -> Vec<ReplicationOp> {
        vec![
            self.wave.sync_op(),
            self.wave_active.sync_op(),
            self.countdown.sync_op(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_seconds(
        director: &mut WaveDirector,
        enemies: &mut Vec<Enemy>,
        bus: &mut ReplicationBus,
        seconds: f32,
    ) -> Option<u32> {
        let dt = 1.0 / 60.0;
        let steps = (seconds / dt).ceil() as usize;
        let mut cleared = None;
        for _ in 0..steps {
            if let Some(wave) = director.tick(enemies, bus, dt) {
                cleared = Some(wave);
            }
        }
        cleared
    }

    #[test]
    fn first_wave_spawns_after_initial_delay() {
        let mut bus = ReplicationBus::authority();
        let mut director = WaveDirector::new(WaveTuning::default());
        let mut enemies = Vec::new();

        director.begin_match(&mut bus);
        assert_eq!(director.current_wave(), 0);
        assert!(!director.is_wave_active());

        run_seconds(&mut director, &mut enemies, &mut bus, 3.1);

        assert_eq!(director.current_wave(), 1);
        assert!(director.is_wave_active());
        assert_eq!(enemies.len(), 4);
        assert!(enemies.iter().all(|e| e.body.kind == EnemyKind::Melee));
    }

    #[test]
    fn clearing_a_wave_reports_the_completion_edge_once() {
        let mut bus = ReplicationBus::authority();
        let mut director = WaveDirector::new(WaveTuning::default());
        let mut enemies = Vec::new();

        director.begin_match(&mut bus);
        run_seconds(&mut director, &mut enemies, &mut bus, 3.1);
        enemies.clear();

        let dt = 1.0 / 60.0;
        let cleared = director.tick(&mut enemies, &mut bus, dt);
        assert_eq!(cleared, Some(1));
        assert!(!director.is_wave_active());

        // The edge fires exactly once.
        assert_eq!(director.tick(&mut enemies, &mut bus, dt), None);
    }

    #[test]
    fn next_wave_spawns_after_inter_wave_delay() {
        let mut bus = ReplicationBus::authority();
        let mut director = WaveDirector::new(WaveTuning::default());
        let mut enemies = Vec::new();

        director.begin_match(&mut bus);
        run_seconds(&mut director, &mut enemies, &mut bus, 3.1);
        enemies.clear();
        run_seconds(&mut director, &mut enemies, &mut bus, 5.2);

        assert_eq!(director.current_wave(), 2);
        assert!(director.is_wave_active());
        let ranged = enemies
            .iter()
            .filter(|e| e.body.kind == EnemyKind::Ranged)
            .count();
        assert_eq!(ranged, 2);
    }

    #[test]
    fn wave_number_is_monotonic_and_stops_at_final_wave() {
        let mut bus = ReplicationBus::authority();
        let mut director = WaveDirector::new(WaveTuning::default());
        let mut enemies = Vec::new();

        director.begin_match(&mut bus);
        let mut observed = Vec::new();
        for _ in 0..3 {
            run_seconds(&mut director, &mut enemies, &mut bus, 6.0);
            observed.push(director.current_wave());
            enemies.clear();
            run_seconds(&mut director, &mut enemies, &mut bus, 0.1);
        }

        assert_eq!(observed, vec![1, 2, 3]);
        assert!(!director.is_wave_active());

        // Exhausted: nothing further spawns.
        run_seconds(&mut director, &mut enemies, &mut bus, 10.0);
        assert_eq!(director.current_wave(), 3);
        assert!(enemies.is_empty());
    }

    #[test]
    fn enemy_ids_are_unique_across_waves() {
        let mut bus = ReplicationBus::authority();
        let mut director = WaveDirector::new(WaveTuning::default());
        let mut enemies = Vec::new();

        director.begin_match(&mut bus);
        run_seconds(&mut director, &mut enemies, &mut bus, 3.1);
        let mut ids: Vec<u64> = enemies.iter().map(|e| e.body.id).collect();
        enemies.clear();
        run_seconds(&mut director, &mut enemies, &mut bus, 5.2);
        ids.extend(enemies.iter().map(|e| e.body.id));

        let mut deduped = ids.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
    }
}
