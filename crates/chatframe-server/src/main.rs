//! chatframe chat service server binary.
//!
//! # Usage
//!
//! ```bash
//! chatframe-server --certfile cert.pem --keyfile key.pem 0.0.0.0 4433
//! ```

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// chatframe chat service server
#[derive(Parser, Debug)]
#[command(name = "chatframe-server")]
#[command(about = "chatframe chat service server")]
#[command(version)]
struct Args {
    /// Address to listen on
    ip: IpAddr,

    /// Port to listen on
    port: u16,

    /// Path to the TLS certificate chain (PEM format)
    #[arg(long)]
    certfile: String,

    /// Path to the TLS private key (PEM format)
    #[arg(long)]
    keyfile: String,

    /// Path to the on-disk state file
    #[arg(long, default_value = "bdd.pickle")]
    state_file: String,

    /// Raise the log level to debug
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let addr = SocketAddr::new(args.ip, args.port);

    chatframe_server::run(
        addr,
        &args.certfile,
        &args.keyfile,
        &args.state_file,
        chatframe_core::DEFAULT_SECRET,
    )
    .await?;

    Ok(())
}
