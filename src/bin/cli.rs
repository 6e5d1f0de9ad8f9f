//! TideKV CLI Client
//!
//! Command-line interface for interacting with a TideKV server.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tidekv::client::SessionClient;
use tidekv::config::{ClientConfig, DEFAULT_ADDR};
use tidekv::protocol::Reply;

/// TideKV CLI
#[derive(Parser, Debug)]
#[command(name = "tidekv-cli")]
#[command(about = "CLI for the TideKV key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    server: String,

    /// Seconds to wait while connecting
    #[arg(long, default_value = "3")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,

        /// Expire the key after this many seconds
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Ping the server
    Ping,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ClientConfig::new(&args.server).dial_timeout(Duration::from_secs(args.timeout));
    let client = SessionClient::connect(config)
        .await
        .with_context(|| format!("could not reach {}", args.server))?;

    let reply = match args.command {
        Commands::Get { key } => match client.get(&key).await? {
            Some(value) => Reply::Value(value),
            None => Reply::NotFound,
        },
        Commands::Set { key, value, ttl } => {
            match ttl {
                Some(secs) => {
                    client
                        .set_with_ttl(&key, &value, Duration::from_secs(secs))
                        .await?
                }
                None => client.set(&key, &value).await?,
            }
            Reply::Ok
        }
        Commands::Del { key } => {
            client.del(&key).await?;
            Reply::Ok
        }
        Commands::Ping => {
            client.ping().await?;
            Reply::Pong
        }
    };
    println!("{}", reply);

    client.close().await?;
    Ok(())
}
