//! SyntropyStack provider plugin
//!
//! Spawned by the host, which reads the handshake line from stdout.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use syntropystack_provider::{
    init_logging_with_default, serve_on_with_options, serve_with_options, BoxError, ServeOptions,
    SyntropyProvider,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "terraform-provider-syntropystack")]
#[command(about = "SyntropyStack infrastructure provider plugin")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, env = "SYNTROPY_PROVIDER_DEBUG")]
    debug: bool,

    /// Listen on a fixed address instead of an ephemeral localhost port
    #[arg(short, long)]
    address: Option<SocketAddr>,

    /// Seconds in-flight requests may run after a shutdown signal
    #[arg(long, default_value_t = 30)]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    init_logging_with_default(if cli.debug { "debug" } else { "info" });
    info!(version = env!("CARGO_PKG_VERSION"), "starting SyntropyStack provider");

    let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(cli.shutdown_timeout));
    let provider = SyntropyProvider::new();

    match cli.address {
        Some(addr) => serve_on_with_options(provider, addr, options).await,
        None => serve_with_options(provider, options).await,
    }
}
