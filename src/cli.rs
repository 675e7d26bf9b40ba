// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keyferry")]
#[command(about = "Conversational SSH key provisioning with password and 2FA authentication")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the provisioning service on the console transport
    Serve {
        /// Path to a keyferry.yml configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Validate the configuration and print the effective settings
    CheckConfig {
        /// Path to a keyferry.yml configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
