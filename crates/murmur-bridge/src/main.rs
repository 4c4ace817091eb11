//! Murmur WebSocket bridge binary.
//!
//! # Usage
//!
//! ```bash
//! # Bridge browsers on :8080 to a local broadcast server
//! murmur-bridge --bind 0.0.0.0:8080 --upstream 127.0.0.1:50051
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use murmur_bridge::{
    BridgeConfig, BridgeState, DEFAULT_BIND_ADDRESS, DEFAULT_UPSTREAM_ADDRESS, serve,
};
use murmur_client::transport::{QuicConnector, TransportConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Murmur WebSocket bridge
#[derive(Parser, Debug)]
#[command(name = "murmur-bridge")]
#[command(about = "WebSocket bridge to the Murmur broadcast server")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_BIND_ADDRESS)]
    bind: String,

    /// Broadcast server address
    #[arg(short, long, default_value = DEFAULT_UPSTREAM_ADDRESS)]
    upstream: String,

    /// Outbound messages buffered per client before eviction
    #[arg(long, default_value = "256")]
    queue_capacity: usize,

    /// Seconds between heartbeat pings
    #[arg(long, default_value = "54")]
    heartbeat_secs: u64,

    /// Seconds a client may go without answering a ping
    #[arg(long, default_value = "60")]
    pong_wait_secs: u64,

    /// Largest inbound message in bytes
    #[arg(long, default_value = "512")]
    max_message_size: usize,

    /// Answer direct messages to offline users locally
    #[arg(long)]
    strict_direct_targets: bool,

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

    let config = BridgeConfig {
        bind_address: args.bind,
        upstream_address: args.upstream,
        queue_capacity: args.queue_capacity,
        heartbeat_interval: Duration::from_secs(args.heartbeat_secs),
        pong_wait: Duration::from_secs(args.pong_wait_secs),
        max_message_size: args.max_message_size,
        strict_direct_targets: args.strict_direct_targets,
        ..BridgeConfig::default()
    };
    config.validate()?;

    tracing::info!("Murmur bridge starting");
    tracing::info!("Upstream broadcast server at {}", config.upstream_address);

    let connector = QuicConnector::new(&config.upstream_address, TransportConfig::development())?;
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let state = BridgeState::new(config, Arc::new(connector));

    serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await?;

    tracing::info!("Bridge stopped");
    Ok(())
}
