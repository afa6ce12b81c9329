//! CLI module for ZPER
//!
//! Provides command-line interface for:
//! - init: Create the data directory
//! - start: Run writer workers until interrupted

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, run, run_command, start, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
