//! Command-line interface for strictly_server.

use clap::{Parser, Subcommand};

/// Strictly Chess - shared chess sessions over HTTP
#[derive(Parser, Debug)]
#[command(name = "strictly_server")]
#[command(about = "Chess session server with a polling sync protocol", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP session server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Port to bind to (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Keep sessions in memory instead of SQLite
        #[arg(long, conflicts_with = "database_url")]
        memory: bool,

        /// SQLite database path
        #[arg(long)]
        database_url: Option<String>,

        /// Session lifetime in seconds
        #[arg(long)]
        session_ttl_secs: Option<u32>,
    },

    /// Create a session on a running server and print its id
    New {
        /// Server URL
        #[arg(long, default_value = "http://127.0.0.1:8099")]
        server_url: String,
    },

    /// Follow a session and print every change
    Watch {
        /// Session id to follow
        session_id: String,

        /// Server URL
        #[arg(long, default_value = "http://127.0.0.1:8099")]
        server_url: String,

        /// Path to a TOML config file supplying `poll_interval_ms`
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Poll interval in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}
