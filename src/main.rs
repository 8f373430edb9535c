//! routectl server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Dashboard / CLI
//!          │  JSON over HTTP
//!          ▼
//!   ┌──────────────┐    ┌────────────┐    ┌──────────────────┐
//!   │ http + api   │───▶│  mutation  │───▶│ validator        │──▶ sing-box check
//!   │ (axum)       │    │  engine    │    │ (checker binary) │
//!   └──────┬───────┘    └─────┬──────┘    └──────────────────┘
//!          │                  │ load / write
//!          │                  ▼
//!          │            ┌────────────┐
//!          │            │  document  │──▶ /etc/sing-box/config.json
//!          │            └────────────┘
//!          ▼
//!   ┌──────────────┐    ┌────────────┐
//!   │  workflow    │───▶│  service   │──▶ systemctl
//!   │ (rollback)   │    │  control   │
//!   └──────────────┘    └────────────┘
//!
//!   Cross-cutting: config (settings + reload), observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use routectl::config::{load_settings, settings_origin, SettingsOrigin, SettingsWatcher};
use routectl::http::HttpServer;
use routectl::lifecycle::{spawn_signal_handler, Shutdown};
use routectl::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "routectl", version, about = "Management backend for sing-box and mosdns")]
struct Args {
    /// Settings file (TOML). Missing file means defaults.
    #[arg(short, long, default_value = "routectl.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let settings = load_settings(&args.config)?;
    logging::init_logging(&settings.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "routectl starting");
    if settings_origin(&args.config) == SettingsOrigin::Defaults {
        tracing::info!(path = %args.config.display(), "Settings file not found, using defaults");
    }
    tracing::info!(
        settings = %args.config.display(),
        bind_address = %settings.server.bind_address,
        singbox_config = %settings.engine.config_path.display(),
        mosdns_config = %settings.dns.config_path.display(),
        auth = settings.server.api_key.is_some(),
        "Settings loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&settings.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Held for the lifetime of the process; dropping it stops reloads.
    let (watcher, config_updates) = SettingsWatcher::new(&args.config);
    let _watcher = if args.config.is_file() {
        match watcher.run() {
            Ok(w) => Some(w),
            Err(e) => {
                tracing::warn!(error = %e, "Settings reload disabled");
                None
            }
        }
    } else {
        None
    };

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(settings);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
