//! hermodr-cli - Command-line admin tool for hermodr
//!
//! Connects to a running server, executes one command and prints the result.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hermodr_client::{Client, ConnectionConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hermodr-cli")]
#[command(about = "Query and command a game server through its hermodr gateway")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:2458", env = "HERMODR_SERVER")]
    server: SocketAddr,

    /// Connect and request timeout in seconds
    #[arg(short, long, default_value_t = 10)]
    timeout: u64,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping the server
    Ping,

    /// List connected users
    Users,

    /// Show the world name
    World,

    /// Show network statistics
    NetStats,

    /// Show when the server started
    StartTime,

    /// Show world name and connected users
    Status,

    /// Send a chat message to every connected user
    Broadcast {
        /// Message text
        message: String,
    },

    /// Send an arbitrary op and dump the response frame
    Raw {
        /// Op code
        #[arg(allow_hyphen_values = true)]
        op: i32,

        /// Request payload as hex
        #[arg(short, long)]
        payload: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let timeout = Duration::from_secs(cli.timeout.max(1));
    let config = ConnectionConfig::new(cli.server)
        .with_connect_timeout(timeout)
        .with_request_timeout(timeout);
    let client = Client::new(config);

    client.connect().await.map_err(|e| {
        eprintln!("{}: {}", "Connection failed".red(), e);
        e
    })?;

    // Spawn read loop in background
    let conn = client.connection();
    tokio::spawn(async move {
        let _ = conn.read_loop().await;
    });

    match commands::execute(&client, cli.command, cli.json).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    client.close().await?;
    Ok(())
}
