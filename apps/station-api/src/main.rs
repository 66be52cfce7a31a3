//! # Beacon Station API
//!
//! HTTP server driving the light-directed retrieval and put-away stations.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Station API Server                               │
//! │                                                                         │
//! │  Terminal ───► HTTP (8080) ───► StationEngine ───► SQLite              │
//! │                                      │                                  │
//! │                     ┌────────────────┼────────────────┐                 │
//! │                     ▼                ▼                ▼                 │
//! │               Light panel      Panel events      Robot fleet           │
//! │               (HTTP POST)      (WebSocket)       (HTTP POST)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Environment
//! - `RUST_LOG` overrides the default filter `info,beacon=debug,sqlx=warn`
//! - `BEACON_CONFIG` points at an explicit `station.toml`
//! - `BEACON_*` overrides, see `beacon_station::config`

mod error;
mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use beacon_db::{Database, DbConfig};
use beacon_station::{
    EngineOptions, HttpFleetClient, HttpLightPanel, ListenerConfig, PanelListener,
    SignalCoordinator, SqliteStore, StationConfig, StationEngine,
};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,beacon=debug,sqlx=warn";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Beacon station API...");

    // Load configuration
    let config_path = std::env::var_os("BEACON_CONFIG").map(PathBuf::from);
    let config = StationConfig::load(config_path)?;
    info!(
        station = %config.fleet.station_name,
        db = %config.database.path.display(),
        panel = %config.light_panel.base_url,
        fleet = %config.fleet.base_url,
        "Configuration loaded"
    );

    // Open database (migrations run on connect)
    let db = Database::new(
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections),
    )
    .await?;
    info!("Database ready");

    // Wire the engine
    let store = Arc::new(SqliteStore::new(db.clone()));
    let panel = Arc::new(HttpLightPanel::new(&config.light_panel)?);
    let signals = Arc::new(SignalCoordinator::new(panel));
    let fleet = Arc::new(HttpFleetClient::new(&config.fleet)?);
    let engine = StationEngine::new(
        store,
        signals.clone(),
        fleet,
        EngineOptions {
            light_color: config.light_panel.color,
        },
    );

    engine.station(&config.fleet.station_name)?;
    match engine.refresh_retrievable().await {
        Ok(plans) => info!(retrievable = plans.len(), "Retrievable orders computed"),
        Err(e) => warn!(error = %e, "Initial retrievable check failed"),
    }

    // Panel confirmations
    let listener = match ListenerConfig::from_settings(&config.light_panel) {
        Some(listener_config) => Some(PanelListener::spawn(listener_config, signals.sender())),
        None => {
            info!("No panel events URL configured; confirmations by scan only");
            None
        }
    };
    let dispatch = engine.spawn_confirmation_dispatch();

    // Serve
    let state = Arc::new(AppState {
        engine: engine.clone(),
        db: db.clone(),
    });
    let app = routes::router(state);

    let addr = config.api.bind_address();
    let tcp = TcpListener::bind(&addr).await?;
    info!(%addr, "Station API listening");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown
    if let Some(listener) = listener {
        if let Err(e) = listener.shutdown().await {
            warn!(error = %e, "Panel listener shutdown failed");
        }
    }
    engine.shutdown().await;
    dispatch.abort();
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Shared application state.
pub struct AppState {
    pub engine: StationEngine,
    pub db: Database,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
