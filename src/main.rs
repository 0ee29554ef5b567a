//! API gateway.
//!
//! Single entry point for browser clients in front of the auth, tenant,
//! node and monitoring services.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌───────────────────────────────────────────────┐
//!                       │                  API GATEWAY                  │
//!                       │                                               │
//!   Client Request      │  ┌──────────┐   ┌─────────┐   ┌───────────┐   │
//!   ────────────────────┼─▶│  origin  │──▶│ routing │──▶│   auth    │───┼──▶ auth service
//!                       │  │   gate   │   │  table  │   │ validator │   │    (/auth/me, /auth/refresh)
//!                       │  └──────────┘   └─────────┘   └─────┬─────┘   │
//!                       │                                     ▼         │
//!   Client Response     │  ┌──────────┐   ┌─────────┐   ┌───────────┐   │
//!   ◀───────────────────┼──│ scrubbed │◀──│  proxy  │◀──│ transform │   │
//!                       │  │ response │   │ monitor │   │           │   │
//!                       │  └──────────┘   └────┬────┘   └───────────┘   │
//!                       └──────────────────────┼────────────────────────┘
//!                                              ▼
//!                               backend / node / monitoring services
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::lifecycle::{wait_for_signal, Shutdown};
use api_gateway::observability::{logging, metrics};
use api_gateway::GatewayServer;

#[derive(Parser, Debug)]
#[command(name = "api-gateway")]
#[command(about = "Auth-aware reverse proxy for the platform services", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability.log_filter);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        allowed_origins = ?config.cors.allowed_origins,
        forward_timeout_secs = config.timeouts.forward_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let server = GatewayServer::new(config)?;

    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            let signal = wait_for_signal().await;
            tracing::info!(signal, "Stopping");
            shutdown.trigger();
        }
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
