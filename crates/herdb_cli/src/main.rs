//! herdb CLI
//!
//! Command-line tools for herdb stores.
//!
//! # Commands
//!
//! - `put` - Store a value
//! - `get` - Print a value
//! - `inspect` - Display store statistics and layout
//! - `verify` - Cross-check every segment index against its data log
//! - `serve` - Serve the store over TCP

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// herdb command-line store tools.
#[derive(Parser)]
#[command(name = "herdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a value under a key
    Put {
        /// Key (UTF-8)
        key: String,
        /// Value (UTF-8)
        value: String,
    },

    /// Print the value stored under a key
    Get {
        /// Key (UTF-8)
        key: String,
    },

    /// Display store statistics and layout
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify every segment index against its data log
    Verify,

    /// Serve the store over TCP until interrupted
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8888")]
        addr: SocketAddr,

        /// Token clients must present before GET or PUT
        #[arg(short, long)]
        token: Option<String>,

        /// Maximum concurrent connections
        #[arg(long, default_value = "1024")]
        max_connections: usize,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Put { key, value } => {
            let path = cli.path.ok_or("Store path required for put")?;
            commands::kv::put(&path, key.as_bytes(), value.as_bytes())?;
        }
        Commands::Get { key } => {
            let path = cli.path.ok_or("Store path required for get")?;
            match commands::kv::get(&path, key.as_bytes())? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => return Err(format!("key not found: {key}").into()),
            }
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Serve {
            addr,
            token,
            max_connections,
        } => {
            let path = cli.path.ok_or("Store path required for serve")?;
            commands::serve::run(&path, addr, token, max_connections)?;
        }
        Commands::Version => {
            println!("herdb CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Store format v{}", herdb_core::FORMAT_VERSION);
        }
    }

    Ok(())
}
