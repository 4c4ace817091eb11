//! Murmur broadcast server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start with self-signed certificate (development)
//! murmur-server --bind 0.0.0.0:50051
//!
//! # Start with TLS certificate (production)
//! murmur-server --bind 0.0.0.0:50051 --cert cert.pem --key key.pem
//! ```

use std::time::Duration;

use clap::Parser;
use murmur_server::{DEFAULT_BIND_ADDRESS, RegistryConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Murmur broadcast server
#[derive(Parser, Debug)]
#[command(name = "murmur-server")]
#[command(about = "Real-time chat broadcast server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Path to TLS certificate (PEM format)
    #[arg(short, long)]
    cert: Option<String>,

    /// Path to TLS private key (PEM format)
    #[arg(short, long)]
    key: Option<String>,

    /// Per-recipient delivery timeout in milliseconds
    #[arg(long, default_value = "10000")]
    send_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Murmur server starting");
    tracing::info!("Binding to {}", args.bind);

    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No TLS certificate provided - using self-signed certificate");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        cert_path: args.cert,
        key_path: args.key,
        registry: RegistryConfig { send_timeout: Duration::from_millis(args.send_timeout_ms) },
    };

    let server = Server::bind(config)?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
