//! live-relay: a transforming proxy with a shared real-time counter.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────────┐
//!                         │                     LIVE RELAY                        │
//!                         │                                                       │
//!   Client Request        │  ┌─────────┐    ┌──────────┐    ┌──────────────────┐  │
//!   ──────────────────────┼─▶│  http   │───▶│ routing  │───▶│ render (Chromium)│  │
//!                         │  │ server  │    │  table   │    └────────┬─────────┘  │
//!                         │  └────┬────┘    └────┬─────┘             │ fallback   │
//!                         │       │              ▼                   ▼            │
//!                         │       │        ┌──────────┐    ┌──────────────────┐   │
//!                         │       │        │ gateway  │◀──▶│      cache       │   │      Origin
//!   Client Response       │       │        │ rewrite/ │    └──────────────────┘   │
//!   ◀─────────────────────┼───────┘        │ stream   │◀─────────────────────────┼──────────────
//!                         │                └──────────┘                           │
//!   WebSocket             │  ┌──────────────────────┐    ┌──────────────────┐    │
//!   ◀────────────────────▶┼─▶│ realtime (hub actor) │    │   egress pool    │    │
//!                         │  └──────────────────────┘    └──────────────────┘    │
//!                         │                                                       │
//!                         │   config · observability · lifecycle                  │
//!                         └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use live_relay::config::load_config;
use live_relay::http::HttpServer;
use live_relay::lifecycle::{signals, Shutdown};
use live_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "live-relay", version, about = "Transforming proxy with a shared real-time counter")]
struct Args {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!("live-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %config.listener.bind_address, error = %e, "Failed to bind listener");
            return Err(e.into());
        }
    };
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
