use std::path::PathBuf;
use clap::{Parser, Subcommand};
use serde_json::Value;

use resilient_client::config::{load_config, ClientConfig};
use resilient_client::qos::{classify, QosSignal};

#[derive(Parser)]
#[command(name = "resilient-cli")]
#[command(about = "Operator CLI for the resilient gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print the effective client settings
    Validate {
        #[arg(short, long, default_value = "resilient.toml")]
        config: PathBuf,
    },
    /// Fetch per-host response metrics from a running gateway
    HostMetrics {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
    /// Show how a status code and headers would be classified
    Classify {
        status: u16,
        /// Header as `name:value`; may be repeated
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => match load_config(&config) {
            Ok(loaded) => {
                let effective = ClientConfig::from(&loaded.client);
                println!("Configuration OK: {}", config.display());
                println!("{}", serde_json::to_string_pretty(&effective)?);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::HostMetrics { url } => {
            let client = reqwest::Client::new();
            let res = client
                .get(format!("{}/_resilience/host-metrics", url.trim_end_matches('/')))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Classify { status, headers } => {
            let pairs: Vec<(&str, &str)> = headers
                .iter()
                .filter_map(|h| h.split_once(':'))
                .map(|(k, v)| (k.trim(), v.trim()))
                .collect();
            match classify(status, pairs.as_slice()) {
                Some(signal) => print_signal(&signal),
                None => println!("{}: not a QoS signal", status),
            }
        }
    }

    Ok(())
}

fn print_signal(signal: &QosSignal) {
    println!("{}: {}", signal.status_code(), signal);
    println!("  retryable:      {}", signal.is_retryable());
    println!("  forbids retry:  {}", signal.forbids_retry());
    if let Some(delay) = signal.retry_after() {
        println!("  retry after:    {}s", delay.as_secs());
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
