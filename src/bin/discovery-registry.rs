use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use edge_gateway::config::{load_directory, DirectoryConfig, ObservabilityConfig};
use edge_gateway::discovery::server::directory_router;
use edge_gateway::lifecycle::wait_for_signal;
use edge_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "discovery-registry")]
#[command(about = "Serves the platform service directory", long_about = None)]
struct Cli {
    /// TOML file with `bind_address` and a `[services]` table.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(&ObservabilityConfig::default());

    let mut directory = match &cli.config {
        Some(path) => load_directory(path)?,
        None => DirectoryConfig::default(),
    };
    if let Some(bind) = cli.bind {
        directory.bind_address = bind;
    }

    let listener = TcpListener::bind(&directory.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        services = directory.services.len(),
        "Discovery registry listening"
    );
    for (name, address) in &directory.services {
        tracing::info!(service = %name, address = %address, "Registered service");
    }

    let app = directory_router(&directory).layer(TraceLayer::new_for_http());
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    tracing::info!("Discovery registry stopped");
    Ok(())
}
