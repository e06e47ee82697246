use super::scene::SceneLoader;
use super::types::{GameEvent, ReplicationBatch, WorldUpdate};
use crate::domain::lobby::{LobbyError, LobbyRoster, LobbySlot};
use crate::domain::replication::{ReplicatedValue, ReplicationBus, ReplicationOp};
use crate::domain::systems::enemy_ai::{Enemy, StepWorld};
use crate::domain::systems::match_flow::{MatchFlow, MatchState};
use crate::domain::systems::projectiles::{resolve_hits, ProjectilePool, ProjectileSpawn};
use crate::domain::systems::score::ScoreLedger;
use crate::domain::systems::spawner::WaveDirector;
use crate::domain::timer::{CountdownStep, SecondCountdown};
use crate::domain::tuning::player::PlayerTuning;
use crate::domain::tuning::projectile::ProjectileTuning;
use crate::domain::tuning::score::ScoreTuning;
use crate::domain::tuning::waves::WaveTuning;
use crate::domain::{Faction, PlayerActor, Vec2};
use crate::interface_adapters::clients::highscores::HighscoreClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

const LOBBY_SCENE: &str = "lobby";
const ARENA_SCENE: &str = "arena";

/// Shared configuration for the world loop.
#[derive(Debug, Clone)]
pub struct WorldSettings {
    /// Fixed tick interval for the game loop.
    pub tick_interval: Duration,
    /// Seats in the lobby; the match starts only when all are ready.
    pub max_players: usize,
    /// Countdown shown once every seat is ready.
    pub lobby_countdown_seconds: f32,
    /// Win/loss conditions are polled every this many ticks.
    pub condition_poll_divisor: u64,
    /// Projectile slots allocated before the first wave.
    pub pool_preallocation: usize,
}

/// Authoritative state for one match, from lobby through a terminal screen.
/// Everything replicated flows through the single bus.
pub struct MatchSession {
    settings: WorldSettings,
    bus: ReplicationBus,
    lobby: LobbyRoster,
    lobby_countdown: Option<SecondCountdown>,
    countdown_display: ReplicatedValue<u32>,
    flow: MatchFlow,
    director: WaveDirector,
    score: ScoreLedger,
    pool: ProjectilePool,
    players: Vec<PlayerActor>,
    enemies: Vec<Enemy>,
    player_tuning: PlayerTuning,
    /// Seconds since the match entered Playing.
    clock: f32,
    scores_submitted: bool,
}

impl MatchSession {
    pub fn new(settings: WorldSettings) -> Self {
        let wave_tuning = WaveTuning::default();
        let final_wave = wave_tuning.final_wave;
        Self {
            lobby: LobbyRoster::new(settings.max_players),
            settings,
            bus: ReplicationBus::authority(),
            lobby_countdown: None,
            countdown_display: ReplicatedValue::new("lobby.countdown", 0),
            flow: MatchFlow::new(final_wave),
            director: WaveDirector::new(wave_tuning),
            score: ScoreLedger::new(ScoreTuning::default()),
            pool: ProjectilePool::new(ProjectileTuning::default()),
            players: Vec::new(),
            enemies: Vec::new(),
            player_tuning: PlayerTuning::default(),
            clock: 0.0,
            scores_submitted: false,
        }
    }

    pub fn state(&self) -> MatchState {
        self.flow.state()
    }

    pub fn is_terminal(&self) -> bool {
        self.flow.is_terminal()
    }

    pub fn team_score(&self) -> i64 {
        self.score.team_score()
    }

    /// Names of everyone holding a lobby seat, in seat order.
    pub fn roster_names(&self) -> Vec<String> {
        let mut slots: Vec<&LobbySlot> = self.lobby.slots().collect();
        slots.sort_by_key(|slot| slot.display_index);
        slots.into_iter().map(|slot| slot.name.clone()).collect()
    }

    pub fn handle_event(&mut self, event: GameEvent) {
        match event {
            GameEvent::Join { player_id, name, color } => {
                info!(player_id, %name, "player joined");
                match self.lobby.register(player_id, name, color, &mut self.bus) {
                    Ok(()) => {}
                    Err(LobbyError::RoomFull) => {
                        // Spectator: receives world and replication streams
                        // but holds no seat.
                        info!(player_id, "lobby full, joining as spectator");
                    }
                    Err(error) => warn!(player_id, ?error, "lobby registration failed"),
                }
            }
            GameEvent::Leave { player_id } => {
                info!(player_id, "player left");
                let _ = self.lobby.remove(player_id, &mut self.bus);
                self.players.retain(|p| p.id != player_id);
                self.cancel_countdown_if_unready();
            }
            GameEvent::Input { player_id, input } => {
                if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
                    player.last_input = input;
                }
            }
            GameEvent::SetName { player_id, name } => {
                if let Err(error) = self.lobby.set_name(player_id, name, &mut self.bus) {
                    warn!(player_id, ?error, "name change failed");
                }
            }
            GameEvent::SetColor { player_id, color } => {
                if let Err(error) = self.lobby.set_color(player_id, color, &mut self.bus) {
                    warn!(player_id, ?error, "color change failed");
                }
            }
            GameEvent::ToggleReady { player_id } => {
                match self.lobby.toggle_ready(player_id, &mut self.bus) {
                    Ok(ready) => {
                        info!(player_id, ready, "ready toggled");
                        if !ready {
                            self.cancel_countdown_if_unready();
                        }
                    }
                    Err(error) => warn!(player_id, ?error, "ready toggle failed"),
                }
            }
            GameEvent::RequestRestart { player_id } => {
                // The restart itself is driven by the world task, which owns
                // the scene loader.
                warn!(player_id, "restart event reached session unhandled");
            }
        }
    }

    /// Tears the match down and reseats everyone in a fresh lobby. Seats and
    /// identities survive; ready flags do not.
    pub fn restart(&mut self, scene_loader: &dyn SceneLoader) {
        let mut roster: Vec<LobbySlot> = self.lobby.slots().cloned().collect();
        roster.sort_by_key(|slot| slot.display_index);

        *self = MatchSession::new(self.settings.clone());
        for slot in roster {
            let _ = self
                .lobby
                .register(slot.connection_id, slot.name, slot.color, &mut self.bus);
        }
        scene_loader.load_scene(LOBBY_SCENE, true);
        info!("match restarted to lobby");
    }

    /// Advances the session one fixed step.
    pub fn tick(&mut self, dt: f32, tick: u64, scene_loader: &dyn SceneLoader) {
        match self.flow.state() {
            MatchState::Lobby => self.tick_lobby(dt, scene_loader),
            MatchState::Playing => {
                self.tick_playing(dt);
                if tick % self.settings.condition_poll_divisor == 0 {
                    self.flow.evaluate(
                        &self.players,
                        self.enemies.len(),
                        self.director.current_wave(),
                        self.director.is_wave_active(),
                        &mut self.bus,
                    );
                }
            }
            MatchState::GameOver | MatchState::Victory => {}
        }
    }

    fn tick_lobby(&mut self, dt: f32, scene_loader: &dyn SceneLoader) {
        if self.lobby_countdown.is_none() && self.lobby.all_ready() {
            let countdown = SecondCountdown::new(self.settings.lobby_countdown_seconds);
            let _ = self
                .countdown_display
                .set(countdown.seconds_remaining(), &mut self.bus);
            self.lobby_countdown = Some(countdown);
            info!(seconds = countdown.seconds_remaining(), "match countdown started");
        }

        let Some(countdown) = self.lobby_countdown.as_mut() else {
            return;
        };
        match countdown.advance(dt) {
            CountdownStep::Pending => {}
            CountdownStep::SecondElapsed(seconds) => {
                let _ = self.countdown_display.set(seconds, &mut self.bus);
            }
            CountdownStep::Finished => {
                let _ = self.countdown_display.set(0, &mut self.bus);
                self.lobby_countdown = None;
                self.start_match(scene_loader);
            }
        }
    }

    fn start_match(&mut self, scene_loader: &dyn SceneLoader) {
        scene_loader.load_scene(ARENA_SCENE, true);

        let mut slots: Vec<LobbySlot> = self.lobby.slots().cloned().collect();
        slots.sort_by_key(|slot| slot.display_index);
        for slot in slots {
            let spawn = self
                .player_tuning
                .spawn_points
                .get(slot.display_index % self.player_tuning.spawn_points.len().max(1))
                .copied()
                .unwrap_or(Vec2::ZERO);
            let mut actor =
                PlayerActor::new(slot.connection_id, slot.name, spawn, self.player_tuning.max_hp);
            actor.color = slot.color;
            self.players.push(actor);
        }

        self.pool.preallocate(self.settings.pool_preallocation);
        self.clock = 0.0;
        self.flow.begin_playing(&mut self.bus);
        self.director.begin_match(&mut self.bus);
    }

    fn tick_playing(&mut self, dt: f32) {
        self.clock += dt;

        self.step_players(dt);

        let mut world = StepWorld {
            players: &mut self.players,
            pool: &mut self.pool,
            now: self.clock,
        };
        for enemy in &mut self.enemies {
            enemy.step(&mut world, dt);
        }

        self.pool.step(dt);

        let credits = resolve_hits(
            &mut self.pool,
            &mut self.players,
            &mut self.enemies,
            &self.player_tuning,
        );
        for credit in credits {
            self.score.award_kill(credit.killer, &mut self.bus);
        }
        self.enemies.retain(|enemy| enemy.body.hp > 0);

        if let Some(cleared) = self.director.tick(&mut self.enemies, &mut self.bus, dt) {
            self.score.award_wave_bonus(cleared, &mut self.bus);
        }
    }

    fn step_players(&mut self, dt: f32) {
        let move_speed = self.player_tuning.move_speed;
        let fire_cooldown = self.player_tuning.fire_cooldown;
        let bullet_speed = self.pool.tuning().player_speed;
        let bullet_damage = self.pool.tuning().player_damage;

        for player in &mut self.players {
            if !player.alive {
                continue;
            }
            player.fire_cooldown = (player.fire_cooldown - dt).max(0.0);

            let input = &player.last_input;
            let movement = Vec2::new(input.move_x, input.move_y).normalized();
            player.pos = player.pos + movement * (move_speed * dt);

            let aim = Vec2::new(input.aim_x, input.aim_y);
            if aim.length() > f32::EPSILON {
                player.facing = aim.angle();
            }

            if input.shoot && player.fire_cooldown <= 0.0 {
                player.fire_cooldown = fire_cooldown;
                self.pool.acquire(ProjectileSpawn {
                    pos: player.pos,
                    facing: player.facing,
                    speed: bullet_speed,
                    damage: bullet_damage,
                    faction: Faction::Player,
                    owner: Some(player.id),
                    spin: false,
                });
            }
        }
    }

    fn cancel_countdown_if_unready(&mut self) {
        if self.lobby_countdown.is_some() && !self.lobby.all_ready() {
            self.lobby_countdown = None;
            let _ = self.countdown_display.set(0, &mut self.bus);
            info!("match countdown cancelled");
        }
    }

    /// Full-state rebuild ops for an observer that missed the live stream.
    pub fn sync_ops(&self) -> Vec<ReplicationOp> {
        let mut ops = self.flow.sync_ops();
        ops.extend(self.lobby.sync_ops());
        ops.push(self.countdown_display.sync_op());
        ops.extend(self.director.sync_ops());
        ops.extend(self.score.sync_ops());
        ops
    }

    pub fn drain_ops(&mut self) -> Vec<ReplicationOp> {
        self.bus.drain()
    }

    pub fn world_update(&self, tick: u64) -> WorldUpdate {
        WorldUpdate {
            tick,
            players: self.players.iter().map(Into::into).collect(),
            enemies: self.enemies.iter().map(|e| (&e.body).into()).collect(),
            projectiles: self.pool.snapshots(),
        }
    }
}

pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    world_tx: broadcast::Sender<WorldUpdate>,
    replication_tx: broadcast::Sender<ReplicationBatch>,
    match_state_tx: watch::Sender<MatchState>,
    scene_loader: Arc<dyn SceneLoader>,
    highscores: Option<Arc<HighscoreClient>>,
    settings: WorldSettings,
    shutdown: Arc<tokio::sync::Notify>,
) {
    let mut tick: u64 = 0;
    let mut session = MatchSession::new(settings.clone());
    let mut sync_pending = false;

    // Drive the fixed-step game loop at the configured tick rate.
    let mut interval = tokio::time::interval(settings.tick_interval);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {}
        }

        while let Ok(event) = input_rx.try_recv() {
            match event {
                GameEvent::Join { .. } => {
                    session.handle_event(event);
                    // The joiner missed every earlier op; rebuild it from
                    // current state. Re-delivery to existing observers is
                    // harmless.
                    sync_pending = true;
                }
                GameEvent::RequestRestart { player_id } => {
                    if session.is_terminal() {
                        session.restart(scene_loader.as_ref());
                        sync_pending = true;
                    } else {
                        warn!(player_id, "restart requested mid-match, ignored");
                    }
                }
                other => session.handle_event(other),
            }
        }

        let dt = settings.tick_interval.as_secs_f32();
        tick += 1;
        session.tick(dt, tick, scene_loader.as_ref());

        let state = session.state();
        if *match_state_tx.borrow() != state {
            let _ = match_state_tx.send(state);
        }

        if session.is_terminal() && !session.scores_submitted {
            session.scores_submitted = true;
            submit_final_scores(&session, highscores.as_ref());
        }

        let mut ops = if sync_pending {
            sync_pending = false;
            session.sync_ops()
        } else {
            Vec::new()
        };
        ops.extend(session.drain_ops());
        if !ops.is_empty() {
            let _ = replication_tx.send(ReplicationBatch { tick, ops });
        }

        let _ = world_tx.send(session.world_update(tick));
    }
}

/// Fire-and-forget submission of the shared final score, one record per
/// seated player. The match outcome never waits on the backend.
fn submit_final_scores(session: &MatchSession, highscores: Option<&Arc<HighscoreClient>>) {
    let Some(client) = highscores else {
        info!("no highscore backend configured, final scores not submitted");
        return;
    };
    let score = session.team_score();
    for name in session.roster_names() {
        let client = Arc::clone(client);
        tokio::spawn(async move {
            match client.submit_score(&name, score).await {
                Ok(receipt) => info!(%name, score, id = %receipt.id, "score submitted"),
                Err(error) => warn!(%name, score, ?error, "score submission failed"),
            }
        });
    }
}
