//! tollgate (v1)
//!
//! A rate-limiting HTTP load balancer built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                     TOLLGATE                      │
//!   Client Request     │  ┌──────────┐   ┌────────────┐   ┌────────────┐  │
//!   ───────────────────┼─▶│ gateway  │──▶│ rate limit │──▶│ dispatcher │  │
//!                      │  │ listener │   │  (bucket)  │   │  + pool    │  │
//!                      │  └──────────┘   └─────┬──────┘   └─────┬──────┘  │
//!                      │                       │                │         │
//!                      │                       ▼                ▼         │
//!                      │                 ┌──────────┐     ┌──────────┐    │
//!                      │                 │  client  │     │ forward  │────┼──▶ Backend
//!                      │                 │  store   │     │ (hyper)  │    │
//!                      │                 └──────────┘     └──────────┘    │
//!                      │                       ▲                ▲         │
//!   Admin Request      │  ┌──────────┐         │          ┌──────────┐    │
//!   ───────────────────┼─▶│  admin   │─────────┘          │  health  │────┼──▶ probes
//!                      │  │ listener │                    │ monitor  │    │
//!                      │  └──────────┘                    └──────────┘    │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use tollgate::config::load_config;
use tollgate::lifecycle::{wait_for_signal, Shutdown};
use tollgate::observability::{init_logging, metrics};
use tollgate::storage::SqliteClientStore;
use tollgate::HttpServer;

#[derive(Parser)]
#[command(name = "tollgate", version, about = "Rate-limiting HTTP load balancer")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "tollgate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tollgate starting");
    tracing::info!(
        config = %args.config.display(),
        backends = config.backends.endpoints.len(),
        strategy = %config.backends.strategy,
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

    let store = Arc::new(SqliteClientStore::connect(&config.database).await?);

    let proxy_listener = TcpListener::bind(&config.listener.bind_address).await?;
    let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;

    let server = HttpServer::new(config, store)?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(proxy_listener, admin_listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
