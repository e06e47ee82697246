// Enemy behavior variants, stepped once per fixed tick on the authority.
// The variant is chosen at spawn and fixed for the enemy's lifetime.

use tracing::debug;

use crate::domain::state::{EnemyBody, EnemyKind, Faction, PlayerActor, Vec2};
use crate::domain::systems::projectiles::{ProjectilePool, ProjectileSpawn};
use crate::domain::tuning::enemy::{MeleeTuning, RangedTuning, VOLLEY_FAN_DEGREES};

/// Everything a behavior may touch while stepping, besides its own body.
pub struct StepWorld<'a> {
    pub players: &'a mut [PlayerActor],
    pub pool: &'a mut ProjectilePool,
    /// Seconds since the match started.
    pub now: f32,
}

pub trait EnemyBehavior: Send {
    fn step(&mut self, body: &mut EnemyBody, world: &mut StepWorld<'_>, dt: f32);
}

pub struct Enemy {
    pub body: EnemyBody,
    behavior: Box<dyn EnemyBehavior>,
}

impl Enemy {
    pub fn spawn(id: u64, kind: EnemyKind, pos: Vec2) -> Self {
        let (behavior, hp): (Box<dyn EnemyBehavior>, i32) = match kind {
            EnemyKind::Melee => {
                let tuning = MeleeTuning::default();
                (Box::new(MeleeBehavior::new(tuning)), tuning.max_hp)
            }
            EnemyKind::Ranged => {
                let tuning = RangedTuning::default();
                (Box::new(RangedBehavior::new(tuning)), tuning.max_hp)
            }
        };
        Self {
            body: EnemyBody {
                id,
                kind,
                pos,
                facing: 0.0,
                hp,
            },
            behavior,
        }
    }

    pub fn step(&mut self, world: &mut StepWorld<'_>, dt: f32) {
        self.behavior.step(&mut self.body, world, dt);
    }
}

/// Index of the nearest living player, ties broken first-found.
pub fn nearest_living_player(players: &[PlayerActor], from: Vec2) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, player) in players.iter().enumerate() {
        if !player.alive {
            continue;
        }
        let distance = player.pos.distance(from);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Movement direction for the kiting variant as a pure function of distance:
/// retreat inside `too_close`, approach beyond `too_far`, otherwise strafe
/// along the 90°-rotated toward-vector.
pub fn kite_direction(pos: Vec2, target: Vec2, too_close: f32, too_far: f32) -> Vec2 {
    let distance = pos.distance(target);
    if distance < too_close {
        (pos - target).normalized()
    } else if distance > too_far {
        (target - pos).normalized()
    } else {
        (target - pos).normalized().perpendicular()
    }
}

/// Chases the nearest living player and lands contact damage on a cooldown.
pub struct MeleeBehavior {
    tuning: MeleeTuning,
    attack_cooldown: f32,
}

impl MeleeBehavior {
    pub fn new(tuning: MeleeTuning) -> Self {
        Self {
            tuning,
            attack_cooldown: 0.0,
        }
    }
}

impl EnemyBehavior for MeleeBehavior {
    fn step(&mut self, body: &mut EnemyBody, world: &mut StepWorld<'_>, dt: f32) {
        self.attack_cooldown = (self.attack_cooldown - dt).max(0.0);

        // Re-acquire every step: the chaser always hounds the closest target.
        let Some(target_index) = nearest_living_player(world.players, body.pos) else {
            return;
        };
        let target = &mut world.players[target_index];

        let toward = (target.pos - body.pos).normalized();
        body.pos = body.pos + toward * (self.tuning.move_speed * dt);
        body.facing = toward.angle();

        if body.pos.distance(target.pos) <= self.tuning.contact_range
            && self.attack_cooldown <= 0.0
        {
            target.hp -= self.tuning.contact_damage;
            if target.hp <= 0 {
                target.hp = 0;
                target.alive = false;
            }
            self.attack_cooldown = self.tuning.attack_interval;
            debug!(
                enemy_id = body.id,
                player_id = target.id,
                player_hp = target.hp,
                "contact hit"
            );
        }
    }
}

/// Keeps a distance band from its target and fires a symmetric volley on a
/// fixed interval, drawing every bullet from the shared pool.
pub struct RangedBehavior {
    tuning: RangedTuning,
    target: Option<u64>,
    last_fire: f32,
}

impl RangedBehavior {
    pub fn new(tuning: RangedTuning) -> Self {
        Self {
            tuning,
            target: None,
            // Negative sentinel so the first volley is not gated at clock zero.
            last_fire: -tuning.fire_interval,
        }
    }

    /// Re-scans only when the current target is gone or dead.
    fn acquire_target(&mut self, players: &[PlayerActor], from: Vec2) -> Option<usize> {
        if let Some(target_id) = self.target {
            if let Some(index) = players
                .iter()
                .position(|p| p.id == target_id && p.alive)
            {
                return Some(index);
            }
            self.target = None;
        }
        let index = nearest_living_player(players, from)?;
        self.target = Some(players[index].id);
        Some(index)
    }
}

impl EnemyBehavior for RangedBehavior {
    fn step(&mut self, body: &mut EnemyBody, world: &mut StepWorld<'_>, dt: f32) {
        let Some(target_index) = self.acquire_target(world.players, body.pos) else {
            return;
        };
        let target_pos = world.players[target_index].pos;

        let direction = kite_direction(body.pos, target_pos, self.tuning.too_close, self.tuning.too_far);
        body.pos = body.pos + direction * (self.tuning.move_speed * dt);
        body.facing = (target_pos - body.pos).angle();

        // Fire gate: skip until the interval has elapsed.
        if world.now < self.last_fire + self.tuning.fire_interval {
            return;
        }
        self.last_fire = world.now;

        let base_angle = (target_pos - body.pos).angle();
        for offset_degrees in VOLLEY_FAN_DEGREES {
            let angle = base_angle + offset_degrees.to_radians();
            world.pool.acquire(ProjectileSpawn {
                pos: body.pos,
                facing: angle,
                speed: self.tuning.bullet_speed,
                damage: self.tuning.bullet_damage,
                faction: Faction::Enemy,
                owner: None,
                spin: true,
            });
        }
        debug!(enemy_id = body.id, bullets = VOLLEY_FAN_DEGREES.len(), "volley fired");
    }
}
