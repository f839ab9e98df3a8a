//! edge-proxy: a reverse proxy with a hot-reloadable routing table.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────────────┐
//!                       │                       EDGE PROXY                          │
//!                       │                                                           │
//!   Client Request      │  ┌──────────┐   ┌──────────┐   ┌──────────────────────┐  │
//!   ────────────────────┼─▶│   net    │──▶│   http   │──▶│ registry snapshot    │  │
//!                       │  │entrypoint│   │  server  │   │  routing: resolve    │  │
//!                       │  └──────────┘   └──────────┘   │  pool: select        │  │
//!                       │                                └──────────┬───────────┘  │
//!                       │                                           ▼              │
//!   Client Response     │  ┌──────────┐   ┌──────────┐   ┌──────────────────────┐  │
//!   ◀───────────────────┼──│ response │◀──│  hyper   │◀──│      instance        │◀─┼── Upstream
//!                       │  └──────────┘   │  client  │   └──────────────────────┘  │
//!                       │                 └──────────┘                             │
//!                       │  ┌─────────────────────────────────────────────────────┐ │
//!                       │  │ config + watcher │ health monitor │ admin │ metrics │ │
//!                       │  └─────────────────────────────────────────────────────┘ │
//!                       └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "edge-proxy")]
#[command(about = "Reverse proxy with health-checked pools and hot reload", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "edge-proxy.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    edge_proxy::lifecycle::startup::run(&cli.config).await?;
    Ok(())
}
