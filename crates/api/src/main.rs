//! SprintMind server binary.
//!
//! Usage:
//!   sprintmind --config sprintmind.toml
//!   sprintmind --port 8080
//!   sprintmind --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `JIRA_URL`, `JIRA_USER`, `JIRA_API_TOKEN` - Tracker connection
//! - `SLACK_BOT_TOKEN` - Enables the chat bridge
//! - `SPRINTMIND_RUNTIME_URL`, `SPRINTMIND_RUNTIME_API_KEY` - Remote runtime for the bridge
//! - `SPRINTMIND_API_KEY` - API authentication key (recommended)
//! - `SPRINTMIND_BIND_ADDR` - Server bind address (default: 127.0.0.1:8080)
//!
//! A `.env` file in the working directory is loaded first.

use clap::Parser;
use sprintmind_api::{serve, AppState};
use sprintmind_coordinator::SprintMindConfig;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "sprintmind", version, about = "Multi-agent sprint assistant")]
struct Args {
    /// Port to listen on (overrides the configured bind address's port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides the configured bind address's host)
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn resolve_addr(configured: &str, args: &Args) -> anyhow::Result<SocketAddr> {
    let mut addr: SocketAddr = configured
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", configured, e))?;
    if let Some(ip) = args.bind {
        addr.set_ip(ip);
    }
    if let Some(port) = args.port {
        addr.set_port(port);
    }
    Ok(addr)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sprintmind_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    if let Some(path) = &args.config {
        tracing::info!(path = %path.display(), "Loading configuration");
    }
    let config = SprintMindConfig::load(args.config.as_deref())?;
    let addr = resolve_addr(&config.server.bind_addr, &args)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            "Server binding to {} exposes the API to all network interfaces. \
             Set SPRINTMIND_API_KEY and put a firewall in front of it.",
            addr.ip()
        );
    }
    if config.server.api_key.is_none() {
        tracing::warn!(
            "SPRINTMIND_API_KEY not set; the runtime and approval routes are unauthenticated"
        );
    } else {
        tracing::info!("API key authentication enabled");
    }

    let state = AppState::from_config(&config).await?;
    serve(Arc::new(state), addr).await?;

    Ok(())
}
