// Simulation entities, math primitives, and per-tick snapshot types.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_angle(radians: f32) -> Self {
        Self::new(radians.cos(), radians.sin())
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// 90° counter-clockwise rotation.
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Which side a projectile belongs to; hits only land on the opposite side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Faction {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerInput {
    pub move_x: f32,
    pub move_y: f32,
    pub aim_x: f32,
    pub aim_y: f32,
    pub shoot: bool,
}

pub struct PlayerActor {
    pub id: u64,
    pub name: String,
    pub color: String,
    pub pos: Vec2,
    pub facing: f32,
    pub hp: i32,
    pub alive: bool,

    // Movement/combat scratch state (never serialized to clients).
    pub last_input: PlayerInput,
    pub fire_cooldown: f32,
}

impl PlayerActor {
    pub fn new(id: u64, name: String, pos: Vec2, max_hp: i32) -> Self {
        Self {
            id,
            name,
            color: String::new(),
            pos,
            facing: 0.0,
            hp: max_hp,
            alive: true,
            last_input: PlayerInput::default(),
            fire_cooldown: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyKind {
    Melee,
    Ranged,
}

/// Spatial and health state shared by every enemy variant. The behavior
/// driving it is chosen once at spawn and fixed for the enemy's lifetime.
pub struct EnemyBody {
    pub id: u64,
    pub kind: EnemyKind,
    pub pos: Vec2,
    pub facing: f32,
    pub hp: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub id: u64,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub hp: i32,
    pub alive: bool,
}

impl From<&PlayerActor> for PlayerSnapshot {
    fn from(p: &PlayerActor) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            color: p.color.clone(),
            x: p.pos.x,
            y: p.pos.y,
            rot: p.facing,
            hp: p.hp,
            alive: p.alive,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EnemySnapshot {
    pub id: u64,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub hp: i32,
}

impl From<&EnemyBody> for EnemySnapshot {
    fn from(e: &EnemyBody) -> Self {
        Self {
            id: e.id,
            kind: e.kind,
            x: e.pos.x,
            y: e.pos.y,
            rot: e.facing,
            hp: e.hp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileSnapshot {
    pub id: u32,
    pub faction: Faction,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
}
