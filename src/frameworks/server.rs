// Framework bootstrap for the arena server runtime.

use crate::domain::systems::match_flow::MatchState;
use crate::frameworks::config;
use crate::interface_adapters::clients::highscores::HighscoreClient;
use crate::interface_adapters::net::{
    highscores_handler, replication_serializer, status_handler, world_update_serializer,
    ws_handler,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::scene::TracingSceneLoader;
use crate::use_cases::{GameEvent, ReplicationBatch, WorldSettings, WorldUpdate, world_task};

use axum::extract::ws::Utf8Bytes;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{Notify, broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    // build state
    let state = build_state().await?;
    // Start the Web Server
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(status_handler))
        .route("/highscores", get(highscores_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

async fn build_state() -> Result<Arc<AppState>> {
    let highscores = match config::highscore_base_url() {
        Some(base_url) => {
            let timeout = config::highscore_timeout();
            let client = HighscoreClient::new(base_url.clone(), timeout).map_err(|e| {
                std::io::Error::other(format!("failed to initialize highscore client: {e}"))
            })?;
            tracing::debug!(
                highscore_base_url = %base_url,
                highscore_timeout_ms = timeout.as_millis(),
                "highscore client configured"
            );
            Some(Arc::new(client))
        }
        None => {
            tracing::info!("no highscore backend configured");
            None
        }
    };

    // Channel wiring for the world loop.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);
    let (world_tx, _world_rx) =
        broadcast::channel::<WorldUpdate>(config::WORLD_BROADCAST_CAPACITY);
    let (world_bytes_tx, _world_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::WORLD_BROADCAST_CAPACITY);
    let (world_latest_tx, _world_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
    let (replication_tx, _replication_rx) =
        broadcast::channel::<ReplicationBatch>(config::REPLICATION_BROADCAST_CAPACITY);
    let (replication_bytes_tx, _replication_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::REPLICATION_BROADCAST_CAPACITY);
    let (match_state_tx, _match_state_rx) = watch::channel::<MatchState>(MatchState::Lobby);

    // Spawn the authoritative world loop.
    let settings = WorldSettings {
        tick_interval: config::TICK_INTERVAL,
        max_players: config::max_players(),
        lobby_countdown_seconds: config::LOBBY_COUNTDOWN_SECONDS,
        condition_poll_divisor: config::CONDITION_POLL_DIVISOR,
        pool_preallocation: config::POOL_PREALLOCATION,
    };
    let shutdown = Arc::new(Notify::new());
    tokio::spawn(world_task(
        input_rx,
        world_tx.clone(),
        replication_tx.clone(),
        match_state_tx.clone(),
        Arc::new(TracingSceneLoader),
        highscores.clone(),
        settings,
        shutdown,
    ));

    // Serialize each stream once; connections forward the shared bytes.
    tokio::spawn(world_update_serializer(
        world_tx.subscribe(),
        world_bytes_tx.clone(),
        world_latest_tx.clone(),
    ));
    tokio::spawn(replication_serializer(
        replication_tx.subscribe(),
        replication_bytes_tx.clone(),
    ));

    Ok(Arc::new(AppState {
        input_tx,
        world_tx,
        world_bytes_tx,
        world_latest_tx,
        replication_tx,
        replication_bytes_tx,
        match_state_tx,
        highscores,
    }))
}
