pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "diskfs")]
#[command(about = "Mount a remote disk account as a local filesystem")]
pub struct Args {
    /// Path to the diskfs config directory (defaults to ~/.diskfs)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
