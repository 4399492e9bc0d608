//! MediaSync CLI
//!
//! Command-line tools for running and inspecting a MediaSync gateway.
//!
//! # Commands
//!
//! - `serve` - Run the gateway (configured from the environment)
//! - `dump` - Print the list stored under a key
//! - `keys` - List stored keys
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// MediaSync gateway tools.
#[derive(Parser)]
#[command(name = "mediasync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync gateway
    Serve {
        /// Address to listen on (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Directory holding one file per key
        #[arg(short, long, conflicts_with = "memory")]
        data_dir: Option<PathBuf>,

        /// Keep data in memory only
        #[arg(short, long)]
        memory: bool,
    },

    /// Print the list stored under a key
    Dump {
        /// Data directory
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Key to print
        #[arg(short, long)]
        key: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List stored keys
    Keys {
        /// Data directory
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Only show keys starting with this prefix
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            data_dir,
            memory,
        } => {
            let backing = match (data_dir, memory) {
                (Some(dir), _) => commands::serve::Backing::Directory(dir),
                (None, true) => commands::serve::Backing::Memory,
                (None, false) => {
                    return Err("either --data-dir or --memory is required".into());
                }
            };
            commands::serve::run(bind, backing)?;
        }
        Commands::Dump {
            data_dir,
            key,
            format,
        } => {
            commands::dump::run(&data_dir, &key, &format)?;
        }
        Commands::Keys { data_dir, prefix } => {
            commands::keys::run(&data_dir, prefix.as_deref())?;
        }
        Commands::Version => {
            println!("MediaSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
