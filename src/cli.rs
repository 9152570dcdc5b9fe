// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hopgate")]
#[command(about = "Run allow-listed commands on servers behind an SSH gateway")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to $CONFIG_FILE)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve JSON tool calls on stdin, one per line
    Serve,

    /// Run a command on a host through the gateway
    Exec {
        /// Target host
        #[arg(long)]
        host: String,

        /// Login user on the target host
        #[arg(short, long)]
        user: String,

        /// Command to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Check a command (and optionally a host) against the policies
    Check {
        /// Target host
        #[arg(long)]
        host: Option<String>,

        /// Command to check
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print the effective configuration
    Config,
}
