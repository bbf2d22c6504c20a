//! CLI argument parsing for the limitd binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "limitd", about = "Tier-based rate limiter service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
}
