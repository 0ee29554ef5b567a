use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;

use api_gateway::config::{load_config, ConfigError, GatewayConfig};
use api_gateway::routing::RouteTable;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the API gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a running gateway's health endpoint
    Health {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
    /// Print the route table and where each target points
    Routes {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load and validate a configuration file
    CheckConfig {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Health { url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/health", url.trim_end_matches('/')))
                .send()
                .await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {}", text);
                }
                return Ok(ExitCode::FAILURE);
            }
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Commands::Routes { config } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => GatewayConfig::default(),
            };
            print_routes(&config);
        }
        Commands::CheckConfig { config } => match load_config(&config) {
            Ok(_) => println!("{}: ok", config.display()),
            Err(ConfigError::Validation(errors)) => {
                eprintln!("{}: {} error(s)", config.display(), errors.len());
                for error in errors {
                    eprintln!("  - {}", error);
                }
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => {
                eprintln!("{}: {}", config.display(), e);
                return Ok(ExitCode::FAILURE);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn print_routes(config: &GatewayConfig) {
    let upstreams = &config.upstreams;
    println!("{:<12} {}", "auth", upstreams.auth);
    println!("{:<12} {}", "backend", upstreams.backend);
    println!("{:<12} {}", "node", upstreams.node);
    println!("{:<12} {}", "monitoring", upstreams.monitoring);
    println!();

    println!(
        "{:<18} {:<32} {:<24} {:<11} {:<5} TRANSFORM",
        "NAME", "PATH", "METHODS", "TARGET", "AUTH"
    );
    for route in RouteTable::gateway_default().routes() {
        println!(
            "{:<18} {:<32} {:<24} {:<11} {:<5} {}",
            route.name,
            route.path.to_string(),
            route.methods.to_string(),
            route.target.to_string(),
            if route.requires_auth { "yes" } else { "no" },
            route.transform
        );
    }
}
