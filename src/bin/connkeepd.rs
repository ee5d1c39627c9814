//! connkeep daemon - holds HTTP connections open and drains them on shutdown
//!
//! Every request to `/connect` is held for 60 seconds, logging progress once
//! a second, then answered with the number of connections active at that
//! moment.
//!
//! # Usage
//!
//! ```bash
//! # Start on 0.0.0.0:8080 with graceful shutdown
//! connkeepd
//!
//! # Listen elsewhere
//! connkeepd --addr 127.0.0.1:9000
//! CONNKEEP_ADDR=127.0.0.1:9000 connkeepd
//!
//! # Die immediately on SIGINT/SIGTERM instead of draining
//! connkeepd --no-graceful
//!
//! # Enable debug logging
//! RUST_LOG=connkeepd=debug connkeepd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop accepting, wait up to 60 seconds for held
//!   connections, then exit

use std::env;
use std::net::SocketAddr;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use connkeep_core::ConnectionRegistry;
use connkeepd::config::{ServerConfig, DEFAULT_ADDR};
use connkeepd::lifecycle::LifecycleCoordinator;
use connkeepd::reporter::spawn_reporter;
use connkeepd::server::ConnectServer;

/// Environment variable overriding the listen address.
const ADDR_ENV: &str = "CONNKEEP_ADDR";

/// connkeep daemon - connection holding HTTP server
#[derive(Parser, Debug)]
#[command(name = "connkeepd", version, about)]
struct Args {
    /// Address to listen on [default: 0.0.0.0:8080, or $CONNKEEP_ADDR]
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Exit abruptly on SIGINT/SIGTERM instead of draining held connections
    #[arg(long)]
    no_graceful: bool,
}

fn resolve_addr(cli: Option<SocketAddr>) -> Result<SocketAddr> {
    if let Some(addr) = cli {
        return Ok(addr);
    }
    match env::var(ADDR_ENV) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Invalid {ADDR_ENV}: {value}")),
        Err(_) => Ok(DEFAULT_ADDR),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = ServerConfig {
        addr: resolve_addr(args.addr)?,
        graceful_shutdown: !args.no_graceful,
        ..Default::default()
    };

    run_daemon(config)
}

#[tokio::main]
async fn run_daemon(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("connkeepd=info".parse()?)
                .add_directive("connkeep_core=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "Starting connkeep daemon"
    );

    let cancel_token = CancellationToken::new();
    let lifecycle = LifecycleCoordinator::new(cancel_token, config.drain_timeout);

    if config.graceful_shutdown {
        let _signal_handle = lifecycle.spawn_signal_listener();
        info!(
            drain_timeout_secs = lifecycle.drain_timeout().as_secs(),
            "Graceful shutdown enabled"
        );
    } else {
        info!("Graceful shutdown disabled, signals terminate immediately");
    }

    let registry = ConnectionRegistry::new();

    let reporter_token = CancellationToken::new();
    let reporter = spawn_reporter(
        registry.clone(),
        config.report_interval,
        reporter_token.clone(),
    );

    let server = ConnectServer::bind(&config, registry, lifecycle)
        .await
        .context("Failed to start HTTP listener")?;

    let outcome = server.run().await?;

    reporter_token.cancel();
    let _ = reporter.await;

    info!(?outcome, "connkeep daemon stopped");
    Ok(())
}
