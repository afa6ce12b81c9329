//! CLI argument definitions using clap
//!
//! Commands:
//! - zper init --config <path>
//! - zper start --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ZPER - durable per-topic message writer
#[derive(Parser, Debug)]
#[command(name = "zper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data directory
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./zper.json")]
        config: PathBuf,
    },

    /// Run writer workers until interrupted
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./zper.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
