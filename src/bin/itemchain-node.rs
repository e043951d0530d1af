#![forbid(unsafe_code)]
//! Runs one itemchain node: starts a new network, or joins one with `--join`.

use clap::Parser;
use itemchain::config::{load_config, DEFAULT_CONFIG_PATH};
use itemchain::node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "itemchain-node", version, about = "Item provenance ledger node")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Membership port; replication listens one port higher
    #[arg(short, long)]
    port: Option<u16>,

    /// Existing member to join, as host:port (its membership port)
    #[arg(short, long)]
    join: Option<String>,

    /// Address peers should use to reach this node
    #[arg(long)]
    advertise_host: Option<String>,

    /// Node name used in logs
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(port) = args.port {
        config.network.base_port = port;
    }
    if let Some(join) = args.join {
        config.network.join = Some(join);
    }
    if let Some(host) = args.advertise_host {
        config.network.advertise_host = Some(host);
    }
    if let Some(name) = args.name {
        config.node.name = name;
    }
    config.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        name = %config.node.name,
        base_port = config.network.base_port,
        join = ?config.network.join,
        "starting itemchain node"
    );

    let node = Arc::new(Node::from_config(config)?);
    node.run().await?;
    Ok(())
}
