//! WebSocket upgrade router.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                 UPGRADE ROUTER                   │
//!   Upgrade request   │  ┌────────┐   ┌──────────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│  http  │──▶│   factory    │──▶│  creator  │  │
//!                     │  │ server │   │ (pathspec +  │   │ (endpoint │  │
//!                     │  └───┬────┘   │  mappings +  │   │  or 4xx)  │  │
//!                     │      │        │  extensions) │   └─────┬─────┘  │
//!                     │      │        └──────────────┘         │        │
//!   Frames            │      ▼                                 ▼        │
//!   ◀─────────────────┼─ session pump ◀──────────────────── endpoint    │
//!                     │                                                  │
//!                     │  config (TOML + watcher) · lifecycle · metrics   │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use upgrade_router::config::{load_config, ConfigWatcher, RouterConfig};
use upgrade_router::lifecycle::{signals, start_factory};
use upgrade_router::observability::{logging, metrics};
use upgrade_router::{HttpServer, UpgradeFactory};

#[derive(Parser)]
#[command(name = "upgrade-router")]
#[command(about = "Routes WebSocket upgrades to endpoints by path", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration, print the mapping table and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    let factory = Arc::new(UpgradeFactory::new());
    start_factory(&factory, &config)?;

    if cli.check {
        println!("{}", serde_json::to_string_pretty(&factory.mappings())?);
        return Ok(());
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("upgrade-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_sessions = config.listener.max_sessions,
        mappings = config.mappings.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (updates, _watcher) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::with_factory(factory, config);
    tokio::spawn(signals::shutdown_on_ctrl_c(server.shutdown_handle()));
    server.run(listener, updates).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
