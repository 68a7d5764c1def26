//! ==============================================================================
//! main.rs - telemetry host entry point
//! ==============================================================================
//!
//! purpose:
//!     wires the mqtt subscriber, the sensor store and the dashboard server
//!     into one process.
//!
//! responsibilities:
//!     - load host.toml (path from the command line)
//!     - register every configured sensor (first topic wins)
//!     - run the mqtt ingestion loop in the background
//!     - serve the dashboard, snapshot api and websocket
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                    rust host (this file)                  │
//!     │  ┌─────────────┐     ┌──────────────┐    ┌─────────────┐  │
//!     │  │ mqtt loop   │ ──> │  dispatcher  │ ─> │ realtime    │  │
//!     │  │ (mqtt.rs)   │     │  + store     │    │ hub (ws)    │  │
//!     │  └─────────────┘     └──────┬───────┘    └──────┬──────┘  │
//!     │                             │ get_all           │         │
//!     │                      ┌──────┴───────────────────┴──────┐  │
//!     │                      │     web server (web.rs)         │  │
//!     │                      └─────────────────────────────────┘  │
//!     └──────────────────────────────────────────────────────────┘
//!
//! ==============================================================================

use telemetry_host::config::HostConfig;
use telemetry_host::mqtt::MqttIngest;
use telemetry_host::web::{self, WebState};
use telemetry_host::{RealtimeHub, SensorStore, UpdateDispatcher};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "telemetry-host")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/host.toml)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration
    let path = cli.config.unwrap_or_else(HostConfig::default_path);
    let config = HostConfig::load(&path);

    // step 2: logging; RUST_LOG wins over the configured level
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("telemetry_host={},tower_http=info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting telemetry host v{}", env!("CARGO_PKG_VERSION"));
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to load configuration");
            return Err(e).with_context(|| format!("loading {}", path.display()));
        }
    };
    config.log_summary();

    // step 3: register sensors
    let store = Arc::new(SensorStore::new().with_span(tracing::info_span!("store", config = %path.display())));
    for sensor in &config.sensors {
        store.register(sensor.clone());
    }
    let topics = store.topics();

    // step 4: wire the store to the live fan-out
    let hub = Arc::new(RealtimeHub::new().with_span(tracing::info_span!("hub", server = %config.server.host)));
    let dispatcher = Arc::new(
        UpdateDispatcher::new(store.clone(), hub.clone())
            .with_span(tracing::info_span!("ingest", broker = %config.mqtt.host)),
    );

    // step 5: mqtt ingestion in background
    let ingest = MqttIngest::new(config.mqtt.clone(), topics);
    let ingest_dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        ingest
            .run(move |topic, value| {
                ingest_dispatcher.ingest(topic, value);
            })
            .await;
    });

    // step 6: serve until ctrl-c
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = WebState {
        dispatcher,
        hub,
        static_dir: config.server.static_dir.clone(),
    };

    tokio::select! {
        res = web::run_server(&addr, state) => res.context("web server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down..."),
    }
    Ok(())
}
