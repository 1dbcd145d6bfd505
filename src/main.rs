//! Note Relay
//!
//! A thin relay in front of a Dify workflow.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                  NOTE RELAY                   │
//!                        │                                               │
//!   POST /api/create-note│  ┌────────┐   ┌──────────┐   ┌────────────┐   │
//!   ─────────────────────┼─▶│  http  │──▶│ classify │──▶│  upstream  │───┼──▶ Dify
//!                        │  │ server │   │ (UA)     │   │  client    │   │   workflows/run
//!                        │  └────────┘   └──────────┘   └─────┬──────┘   │
//!                        │                                    │          │
//!   JSON envelope        │  ┌──────────┐    blocking          │          │
//!   ◀────────────────────┼──│ response │◀─────────────────────┤          │
//!   or chunked text      │  │          │◀── stream + decoder ─┘          │
//!                        │  └──────────┘    streaming                    │
//!                        │                                               │
//!                        │  config · observability · lifecycle           │
//!                        └───────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use note_relay::config::load_config;
use note_relay::lifecycle::{signals, Shutdown};
use note_relay::observability::{logging, metrics};
use note_relay::HttpServer;

#[derive(Parser)]
#[command(name = "note-relay")]
#[command(about = "Relay notes to a Dify workflow", long_about = None)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability)?;

    tracing::info!("note-relay v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        api_key_set = config.upstream.api_key.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
