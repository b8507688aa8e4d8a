use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the edge gateway", long_about = None)]
struct Cli {
    /// Gateway base URL.
    #[arg(short, long, default_value = "http://localhost:4000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway status and service counts
    Health,
    /// Per-service health snapshot
    Services,
    /// Raw directory from the discovery registry
    Discovery {
        #[arg(long, default_value = "http://localhost:3000")]
        registry: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let endpoint = match &cli.command {
        Commands::Health => format!("{base}/health"),
        Commands::Services => format!("{base}/health/services"),
        Commands::Discovery { registry } => {
            format!("{}/services", registry.trim_end_matches('/'))
        }
    };

    let res = client.get(&endpoint).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: {} returned status {}", res.url(), status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
