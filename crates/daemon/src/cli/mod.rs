use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod op;
pub mod ops;

#[derive(Parser, Debug)]
#[command(name = "blawg", version, about = "Serve a Markdown blog from a GitHub repository")]
pub struct Cli {
    /// Path to the TOML config file (default: ./blawg.toml if present)
    #[arg(long, short, global = true, env = "BLAWG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the blog server
    Serve(ops::Serve),
    /// Run one sync pass now, ignoring the throttle
    Sync(ops::SyncNow),
    /// Check the config and probe a running server
    Health(ops::Health),
    /// Print version information
    Version(ops::Version),
}
