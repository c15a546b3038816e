use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tvnab")]
#[command(author, version, about = "TV show tracking and download automation")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Start {
        /// Discard the saved schedule and shows before starting
        #[arg(long)]
        clean: bool,
    },

    /// Print the saved schedule
    Schedule {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove the saved schedule and shows files
    Clean,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
