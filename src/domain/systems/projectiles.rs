// Projectile pool and lifecycle: pre-allocated reusable slots, exclusive
// checkout, lifetime expiry, and opposing-faction hit resolution.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::domain::state::{Faction, PlayerActor, ProjectileSnapshot, Vec2};
use crate::domain::systems::enemy_ai::Enemy;
use crate::domain::tuning::enemy::ENEMY_RADIUS;
use crate::domain::tuning::player::PlayerTuning;
use crate::domain::tuning::projectile::ProjectileTuning;

/// Non-owning handle into the pool's slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectileId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotPhase {
    /// Parked in the available queue, invisible to observers.
    Parked,
    /// Checked out and simulating.
    Live,
    /// Torn down externally; skipped and discarded by `acquire`.
    Retired,
}

#[derive(Debug)]
pub struct ProjectileSlot {
    phase: SlotPhase,
    pub pos: Vec2,
    pub facing: f32,
    pub speed: f32,
    pub damage: i32,
    pub faction: Faction,
    /// Player credited with kills from this projectile, when known.
    pub owner: Option<u64>,
    pub spin: bool,
    age: f32,
}

impl ProjectileSlot {
    fn parked() -> Self {
        Self {
            phase: SlotPhase::Parked,
            pos: Vec2::ZERO,
            facing: 0.0,
            speed: 0.0,
            damage: 0,
            faction: Faction::Enemy,
            owner: None,
            spin: false,
            age: 0.0,
        }
    }

    pub fn is_live(&self) -> bool {
        self.phase == SlotPhase::Live
    }
}

/// Pose and payload for a newly checked-out projectile.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpawn {
    pub pos: Vec2,
    pub facing: f32,
    pub speed: f32,
    pub damage: i32,
    pub faction: Faction,
    pub owner: Option<u64>,
    pub spin: bool,
}

/// Owns every projectile instance for a match. Slots are recycled, never
/// destroyed during play; the pool only grows.
pub struct ProjectilePool {
    slots: Vec<ProjectileSlot>,
    available: VecDeque<u32>,
    tuning: ProjectileTuning,
}

impl ProjectilePool {
    pub fn new(tuning: ProjectileTuning) -> Self {
        Self {
            slots: Vec::new(),
            available: VecDeque::new(),
            tuning,
        }
    }

    /// Allocates parked slots up front to avoid growth churn mid-wave.
    pub fn preallocate(&mut self, count: usize) {
        for _ in 0..count {
            self.grow();
        }
        debug!(slots = self.slots.len(), "projectile pool preallocated");
    }

    pub fn tuning(&self) -> &ProjectileTuning {
        &self.tuning
    }

    pub fn total(&self) -> usize {
        self.slots.len()
    }

    pub fn available_len(&self) -> usize {
        self.available.len()
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_live()).count()
    }

    pub fn get(&self, id: ProjectileId) -> Option<&ProjectileSlot> {
        self.slots.get(id.0 as usize)
    }

    fn grow(&mut self) -> u32 {
        let index = self.slots.len() as u32;
        self.slots.push(ProjectileSlot::parked());
        self.available.push_back(index);
        index
    }

    /// Checks out a slot, reconfigured to the given spawn. Retired entries in
    /// the queue are skipped and discarded (bounded attempts); slots that are
    /// somehow still live go back to the queue untouched. When nothing usable
    /// is found the pool grows by exactly one slot, so acquisition never
    /// fails and never hands out a slot that is live elsewhere.
    pub fn acquire(&mut self, spawn: ProjectileSpawn) -> ProjectileId {
        let mut chosen: Option<u32> = None;
        let mut attempts = 0;
        while attempts < self.tuning.max_acquire_attempts {
            let Some(index) = self.available.pop_front() else {
                break;
            };
            match self.slots[index as usize].phase {
                SlotPhase::Parked => {
                    chosen = Some(index);
                    break;
                }
                SlotPhase::Live => {
                    // Should not happen with the release guard; keep it queued.
                    self.available.push_back(index);
                }
                SlotPhase::Retired => {
                    // Torn down externally; drop the stale handle.
                    debug!(slot = index, "discarding retired projectile slot");
                }
            }
            attempts += 1;
        }

        let index = match chosen {
            Some(index) => index,
            None => {
                let index = self.grow();
                // grow() parks the new slot in the queue; claim it now.
                self.available.pop_back();
                info!(slots = self.slots.len(), "projectile pool expanded");
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.phase = SlotPhase::Live;
        slot.pos = spawn.pos;
        slot.facing = spawn.facing;
        slot.speed = spawn.speed;
        slot.damage = spawn.damage;
        slot.faction = spawn.faction;
        slot.owner = spawn.owner;
        slot.spin = spawn.spin;
        slot.age = 0.0;
        ProjectileId(index)
    }

    /// Parks a live slot back into the queue. Double release is a no-op, so a
    /// slot can never be enqueued twice.
    pub fn release(&mut self, id: ProjectileId) {
        let Some(slot) = self.slots.get_mut(id.0 as usize) else {
            return;
        };
        if slot.phase != SlotPhase::Live {
            return;
        }
        slot.phase = SlotPhase::Parked;
        self.available.push_back(id.0);
    }

    /// Marks a slot as externally torn down. Normal play never calls this;
    /// it models the disable-only escape hatch the acquire loop defends
    /// against.
    pub fn retire(&mut self, id: ProjectileId) {
        if let Some(slot) = self.slots.get_mut(id.0 as usize) {
            slot.phase = SlotPhase::Retired;
        }
    }

    /// Advances every live projectile and releases the ones that aged out.
    pub fn step(&mut self, dt: f32) {
        let mut expired = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.is_live() {
                continue;
            }
            slot.pos = slot.pos + Vec2::from_angle(slot.facing) * (slot.speed * dt);
            if slot.spin {
                slot.facing += self.tuning.spin_rate * dt;
            }
            slot.age += dt;
            if slot.age >= self.tuning.lifetime {
                expired.push(ProjectileId(index as u32));
            }
        }
        for id in expired {
            self.release(id);
        }
    }

    pub fn iter_live(&self) -> impl Iterator<Item = (ProjectileId, &ProjectileSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_live())
            .map(|(index, slot)| (ProjectileId(index as u32), slot))
    }

    pub fn snapshots(&self) -> Vec<ProjectileSnapshot> {
        self.iter_live()
            .map(|(id, slot)| ProjectileSnapshot {
                id: id.0,
                faction: slot.faction,
                x: slot.pos.x,
                y: slot.pos.y,
                rot: slot.facing,
            })
            .collect()
    }
}

/// A kill that the score ledger should credit.
#[derive(Debug, Clone, Copy)]
pub struct KillCredit {
    pub enemy_id: u64,
    pub killer: Option<u64>,
}

/// Resolves live projectiles against opposing-faction targets. A hit applies
/// fixed damage and unconditionally ends the projectile's life, whatever
/// happens to the target. Dead enemies are reported for scoring; the caller
/// removes them.
pub fn resolve_hits(
    pool: &mut ProjectilePool,
    players: &mut [PlayerActor],
    enemies: &mut [Enemy],
    player_tuning: &PlayerTuning,
) -> Vec<KillCredit> {
    let mut released = Vec::new();
    let mut credits = Vec::new();
    let projectile_radius = pool.tuning().radius;

    for (id, slot) in pool.iter_live() {
        match slot.faction {
            Faction::Enemy => {
                let hit_radius = projectile_radius + player_tuning.radius;
                let target = players
                    .iter_mut()
                    .filter(|p| p.alive)
                    .find(|p| p.pos.distance(slot.pos) <= hit_radius);
                if let Some(player) = target {
                    player.hp -= slot.damage;
                    if player.hp <= 0 {
                        player.hp = 0;
                        player.alive = false;
                        info!(player_id = player.id, "player downed");
                    }
                    released.push(id);
                }
            }
            Faction::Player => {
                let hit_radius = projectile_radius + ENEMY_RADIUS;
                let target = enemies
                    .iter_mut()
                    .map(|e| &mut e.body)
                    .filter(|b| b.hp > 0)
                    .find(|b| b.pos.distance(slot.pos) <= hit_radius);
                if let Some(body) = target {
                    body.hp -= slot.damage;
                    if body.hp <= 0 {
                        credits.push(KillCredit {
                            enemy_id: body.id,
                            killer: slot.owner,
                        });
                    }
                    released.push(id);
                }
            }
        }
    }

    for id in released {
        pool.release(id);
    }
    credits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_at(pos: Vec2, faction: Faction) -> ProjectileSpawn {
        ProjectileSpawn {
            pos,
            facing: 0.0,
            speed: 10.0,
            damage: 10,
            faction,
            owner: None,
            spin: false,
        }
    }

    fn empty_pool() -> ProjectilePool {
        ProjectilePool::new(ProjectileTuning::default())
    }

    #[test]
    fn acquire_on_empty_pool_grows_by_one() {
        let mut pool = empty_pool();
        assert_eq!(pool.total(), 0);

        let id = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));

        assert_eq!(pool.total(), 1);
        assert_eq!(pool.live_count(), 1);
        assert_eq!(pool.available_len(), 0);
        assert!(pool.get(id).is_some_and(|s| s.is_live()));
    }

    #[test]
    fn release_then_acquire_reuses_the_slot_without_growth() {
        let mut pool = empty_pool();
        let first = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));

        pool.release(first);
        assert_eq!(pool.available_len(), 1);
        assert_eq!(pool.live_count(), 0);

        let second = pool.acquire(spawn_at(Vec2::new(3.0, 4.0), Faction::Enemy));
        assert_eq!(first, second);
        assert_eq!(pool.total(), 1);
    }

    #[test]
    fn live_and_available_partition_all_slots() {
        let mut pool = empty_pool();
        pool.preallocate(8);

        let mut held = Vec::new();
        for i in 0..5 {
            held.push(pool.acquire(spawn_at(Vec2::new(i as f32, 0.0), Faction::Player)));
        }
        pool.release(held[1]);
        pool.release(held[3]);

        assert_eq!(pool.live_count() + pool.available_len(), pool.total());
        // Exclusive checkout: no held id appears in the available queue twice.
        let live: Vec<_> = pool.iter_live().map(|(id, _)| id).collect();
        assert_eq!(live.len(), 3);
        for id in &live {
            assert!(held.contains(id));
        }
    }

    #[test]
    fn double_release_never_enqueues_twice() {
        let mut pool = empty_pool();
        let id = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));

        pool.release(id);
        pool.release(id);
        assert_eq!(pool.available_len(), 1);

        // Both subsequent acquires must hand out distinct slots.
        let a = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));
        let b = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));
        assert_ne!(a, b);
        assert_eq!(pool.live_count(), 2);
    }

    #[test]
    fn retired_slots_are_skipped_and_discarded() {
        let mut pool = empty_pool();
        pool.preallocate(3);
        // Retire the slot at the head of the queue.
        pool.retire(ProjectileId(0));

        let id = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));

        assert_ne!(id, ProjectileId(0));
        assert!(pool.get(id).is_some_and(|s| s.is_live()));
        // The retired handle is gone from the queue for good.
        assert_eq!(pool.available_len(), 1);
    }

    #[test]
    fn all_retired_queue_grows_instead_of_failing() {
        let mut pool = empty_pool();
        pool.preallocate(2);
        pool.retire(ProjectileId(0));
        pool.retire(ProjectileId(1));

        let id = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));

        assert_eq!(id, ProjectileId(2));
        assert_eq!(pool.total(), 3);
    }

    #[test]
    fn lifetime_expiry_returns_slot_to_pool() {
        let mut pool = empty_pool();
        let id = pool.acquire(spawn_at(Vec2::ZERO, Faction::Player));

        // 5 second lifetime at a 60 Hz step.
        let dt = 1.0 / 60.0;
        for _ in 0..(5 * 60 + 2) {
            pool.step(dt);
        }

        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.available_len(), 1);
        assert!(pool.get(id).is_some_and(|s| !s.is_live()));
    }

    #[test]
    fn step_advances_along_facing() {
        let mut pool = empty_pool();
        let id = pool.acquire(ProjectileSpawn {
            pos: Vec2::ZERO,
            facing: 0.0,
            speed: 10.0,
            damage: 10,
            faction: Faction::Player,
            owner: None,
            spin: false,
        });

        pool.step(0.5);

        let slot = pool.get(id).expect("slot exists");
        assert!((slot.pos.x - 5.0).abs() < 1e-4);
        assert!(slot.pos.y.abs() < 1e-4);
    }

    #[test]
    fn enemy_projectile_damages_player_and_is_released() {
        let mut pool = empty_pool();
        let tuning = PlayerTuning::default();
        let mut players = vec![PlayerActor::new(1, "p1".into(), Vec2::ZERO, tuning.max_hp)];
        let mut enemies: Vec<Enemy> = Vec::new();

        pool.acquire(spawn_at(Vec2::new(0.1, 0.0), Faction::Enemy));
        let credits = resolve_hits(&mut pool, &mut players, &mut enemies, &tuning);

        assert!(credits.is_empty());
        assert_eq!(players[0].hp, tuning.max_hp - 10);
        assert_eq!(pool.live_count(), 0);
    }

    #[test]
    fn player_projectile_kill_reports_owner_credit() {
        let mut pool = empty_pool();
        let tuning = PlayerTuning::default();
        let mut players: Vec<PlayerActor> = Vec::new();
        let mut enemies = vec![Enemy::spawn(7, crate::domain::state::EnemyKind::Melee, Vec2::ZERO)];
        enemies[0].body.hp = 10;

        pool.acquire(ProjectileSpawn {
            owner: Some(42),
            ..spawn_at(Vec2::new(0.1, 0.0), Faction::Player)
        });
        let credits = resolve_hits(&mut pool, &mut players, &mut enemies, &tuning);

        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].enemy_id, 7);
        assert_eq!(credits[0].killer, Some(42));
        assert!(enemies[0].body.hp <= 0);
    }

    #[test]
    fn dead_players_are_not_hit() {
        let mut pool = empty_pool();
        let tuning = PlayerTuning::default();
        let mut players = vec![PlayerActor::new(1, "p1".into(), Vec2::ZERO, tuning.max_hp)];
        players[0].alive = false;
        let mut enemies: Vec<Enemy> = Vec::new();

        pool.acquire(spawn_at(Vec2::new(0.1, 0.0), Faction::Enemy));
        resolve_hits(&mut pool, &mut players, &mut enemies, &tuning);

        assert_eq!(players[0].hp, tuning.max_hp);
        // No target means the projectile keeps flying.
        assert_eq!(pool.live_count(), 1);
    }
}
