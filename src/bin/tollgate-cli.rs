use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "tollgate-cli")]
#[command(about = "Management CLI for the tollgate load balancer", long_about = None)]
struct Cli {
    /// Base URL of the management listener
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision a client with its own bucket
    AddClient {
        #[arg(long)]
        ip: String,
        #[arg(long)]
        capacity: u32,
        /// Tokens added per refill interval
        #[arg(long)]
        rate: u32,
        /// Initial tokens (defaults to capacity)
        #[arg(long)]
        tokens: Option<u32>,
    },
    /// Remove a client (reserved by the server)
    RemoveClient {
        #[arg(long)]
        ip: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let endpoint = format!("{}/api/v1/client", cli.url.trim_end_matches('/'));

    match cli.command {
        Commands::AddClient {
            ip,
            capacity,
            rate,
            tokens,
        } => {
            let body = json!({
                "ip": ip,
                "capacity": capacity,
                "rate_per_interval": rate,
                "tokens": tokens.unwrap_or(capacity),
            });
            let res = client.post(&endpoint).json(&body).send().await?;
            print_response(res).await?;
        }
        Commands::RemoveClient { ip } => {
            let res = client
                .delete(&endpoint)
                .json(&json!({ "ip": ip }))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{rendered}");
    } else {
        eprintln!("Error: management API returned status {status}");
        eprintln!("{rendered}");
    }
    Ok(())
}
