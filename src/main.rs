//! Edge gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     EDGE GATEWAY                      │
//!                      │                                                       │
//!   Client Request     │  ┌──────────┐    ┌────────────┐    ┌──────────────┐   │
//!   ───────────────────┼─▶│   http   │───▶│ rate_limit │───▶│   routing    │   │
//!                      │  │  server  │    │  (window)  │    │ longest pfx  │   │
//!                      │  └──────────┘    └────────────┘    └──────┬───────┘   │
//!                      │                                           │           │
//!                      │                                           ▼           │
//!                      │                                   ┌──────────────┐    │
//!                      │  ┌──────────┐  probes            │   registry   │    │
//!                      │  │  health  │───────────────────▶│ ServiceTable │    │
//!                      │  │ monitor  │                    │  (ArcSwap)   │    │
//!                      │  └──────────┘                    └──────┬───────┘    │
//!                      │        ▲ reload                          │            │
//!                      │  ┌─────┴─────┐                           ▼            │
//!   Client Response    │  │ discovery │                    ┌──────────────┐    │
//!   ◀──────────────────┼──│  client   │           proxy ◀──│ hyper client │◀───┼── Service
//!                      │  └───────────┘                    └──────────────┘    │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use edge_gateway::config::{load_config, GatewayConfig};
use edge_gateway::lifecycle::{wait_for_signal, Shutdown};
use edge_gateway::observability::{logging, metrics};
use edge_gateway::{HttpServer, ServiceRegistry};

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "HTTP edge gateway with service discovery and health checks", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults are used if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        discovery = %config.discovery.url,
        routes = config.routes.len(),
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

    let registry = Arc::new(ServiceRegistry::from_config(&config)?);
    registry.initialize().await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, Arc::clone(&registry));
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let finished = tokio::select! {
        _ = wait_for_signal() => None,
        result = &mut server_task => Some(result),
    };
    shutdown.trigger();

    let result = match finished {
        Some(result) => result,
        None => server_task.await,
    };
    registry.stop().await;

    match result {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Server task failed"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
