//! Request gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                 REQUEST GATEWAY                   │
//!   Client Request       │  ┌──────────┐    ┌─────────────────┐             │
//!   ─────────────────────┼─▶│  http    │───▶│ load_balancer   │             │
//!   /v1/proxy/{service}  │  │ server   │    │ round robin +   │             │
//!                        │  └────┬─────┘    │ circuit breakers│             │
//!                        │       │          └────────┬────────┘             │
//!                        │       │   selected backend│                      │
//!                        │       ▼                   ▼                      │
//!   Client Response      │  ┌──────────┐    ┌─────────────────┐             │
//!   ◀────────────────────┼──│ response │◀───│  hyper client   │◀────────────┼──── Backend
//!                        │  └──────────┘    └────────┬────────┘             │
//!                        │                           │ outcome              │
//!                        │                           ▼                      │
//!                        │                  report_success / report_failure │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use request_gateway::config::load_config;
use request_gateway::lifecycle::{signals, Shutdown};
use request_gateway::observability::{logging, metrics};
use request_gateway::resilience::SystemClock;
use request_gateway::{BackendSelector, GatewayServer};

#[derive(Parser)]
#[command(name = "request-gateway")]
#[command(about = "Reverse-proxy gateway with per-backend circuit breakers", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("request-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        path = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        services = ?config.services.keys().collect::<Vec<_>>(),
        failure_threshold = config.circuit_breaker.failure_threshold,
        cooldown_secs = config.circuit_breaker.cooldown_secs,
        "Configuration loaded"
    );
    if config.services.is_empty() {
        tracing::warn!("No services configured; every proxied request will return 404");
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let selector = Arc::new(BackendSelector::from_config(&config, Arc::new(SystemClock)));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = GatewayServer::new(config, selector);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
