// Framework bootstrap for the arena server runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{
    create_lobby_handler, health_handler, spawn_lobby_serializer, ws_handler,
};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{LobbyRegistry, LobbySettings, LoopSettings};

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::{collections::HashSet, io::Result, sync::Arc, time::Duration};

const DEFAULT_LOBBY_ID: &str = "test";

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

/// Serves on an already bound listener with settings read from the
/// environment. The default lobby starts without a countdown.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let settings = lobby_settings(Duration::ZERO)?;
    serve(listener, settings).await
}

async fn serve(listener: tokio::net::TcpListener, settings: LobbySettings) -> Result<()> {
    let address = listener.local_addr()?;
    let state = build_state(settings).await?;
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/lobbies", post(create_lobby_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let settings = lobby_settings(config::match_countdown())?;
    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    serve(listener, settings).await
}

fn lobby_settings(match_countdown: Duration) -> Result<LobbySettings> {
    let tuning_path = config::tuning_path();
    let tuning = config::load_tuning(tuning_path.as_deref()).map_err(|e| {
        tracing::error!(error = %e, "failed to load tuning");
        std::io::Error::other(e)
    })?;
    tracing::debug!(
        tuning_path = ?tuning_path,
        tick_rate_hz = config::tick_rate_hz(),
        replication_interval_ticks = config::replication_interval_ticks(),
        "runtime configured"
    );

    Ok(LobbySettings {
        input_channel_capacity: config::INPUT_CHANNEL_CAPACITY,
        world_broadcast_capacity: config::WORLD_BROADCAST_CAPACITY,
        loop_settings: LoopSettings {
            tick_rate_hz: config::tick_rate_hz(),
            replication_interval_ticks: config::replication_interval_ticks(),
            match_countdown,
        },
        tuning: Arc::new(tuning),
    })
}

async fn build_state(settings: LobbySettings) -> Result<Arc<AppState>> {
    // Setup Lobby Registry
    // This owns the set of active lobby world tasks.
    let lobby_registry = Arc::new(LobbyRegistry::new(settings));

    // Keep the default lobby pinned so it never gets deleted.
    let default_lobby = lobby_registry
        .create_lobby(DEFAULT_LOBBY_ID.to_string(), HashSet::new(), true)
        .await
        .map_err(|e| std::io::Error::other(format!("default lobby failed to start: {e:?}")))?;
    spawn_lobby_serializer(&default_lobby);

    Ok(Arc::new(AppState {
        lobby_registry,
        default_lobby_id: Arc::from(DEFAULT_LOBBY_ID),
    }))
}
