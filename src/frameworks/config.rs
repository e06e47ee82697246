use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("ARENA_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

/// None disables score submission and the highscore proxy route.
pub fn highscore_base_url() -> Option<String> {
    env::var("HIGHSCORE_BASE_URL").ok().filter(|v| !v.is_empty())
}

pub fn highscore_timeout() -> Duration {
    let millis = env::var("HIGHSCORE_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(1500);
    Duration::from_millis(millis)
}

pub fn max_players() -> usize {
    env::var("ARENA_MAX_PLAYERS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;
// Replication ops must not be dropped mid-session, so this buffer is deep.
pub const REPLICATION_BROADCAST_CAPACITY: usize = 1024;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
// Win/loss polling cadence in fixed ticks (10 Hz at the 60 Hz tick rate).
pub const CONDITION_POLL_DIVISOR: u64 = 6;

pub const LOBBY_COUNTDOWN_SECONDS: f32 = 3.0;
// Projectile slots allocated before the first wave.
pub const POOL_PREALLOCATION: usize = 32;
