//! chatframe chat service client binary.
//!
//! A minimal line-oriented front end: lines typed on stdin are posted,
//! and delivered records are printed to stdout. Anything richer (a
//! terminal UI, a GUI) is an external collaborator that would drive
//! [`chatframe_client::SessionDriver`] the same way this binary does.
//!
//! # Usage
//!
//! ```bash
//! chatframe-client -u alice 127.0.0.1 4433
//! ```

use std::net::{IpAddr, SocketAddr};

use chatframe_client::{ChatRecord, SessionDriver};
use clap::Parser;
use dialoguer::Password;
use rustls_pki_types::ServerName;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// chatframe chat service client
#[derive(Parser, Debug)]
#[command(name = "chatframe-client")]
#[command(about = "chatframe chat service client")]
#[command(version)]
struct Args {
    /// Server address to connect to
    ip: IpAddr,

    /// Server port to connect to
    port: u16,

    /// Username to connect or register as
    #[arg(short, long)]
    username: String,

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

    let password = Password::new().with_prompt("password").interact()?;

    let addr = SocketAddr::new(args.ip, args.port);
    let server_name = ServerName::try_from(args.ip.to_string())
        .map_err(|e| format!("invalid server address for TLS: {e}"))?;
    let tls_config = chatframe_client::transport::default_client_config()?;
    let stream = chatframe_client::transport::connect(addr, server_name, tls_config).await?;

    let mut driver = SessionDriver::connect(stream, &args.username, &password).await?;
    tracing::info!(uid = driver.uid(), "connected");

    let (in_tx, in_rx) = mpsc::channel(32);
    let (out_tx, mut out_rx) = mpsc::channel(32);

    let driver_handle = tokio::spawn(async move { driver.run(in_rx, out_tx).await });

    let stdin_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if in_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    #[allow(clippy::print_stdout)]
    while let Some(record) = out_rx.recv().await {
        match record {
            ChatRecord::Message { author_name, body, .. } => println!("{author_name}: {body}"),
            ChatRecord::Server { body, .. } => println!("* {body}"),
            ChatRecord::Error { body, .. } => println!("! {body}"),
        }
    }

    stdin_handle.abort();
    driver_handle.await??;
    Ok(())
}
