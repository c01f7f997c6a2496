use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "strata",
    about = "Inspect and maintain Strata checkpoints on a local directory",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory the blob store is rooted at
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Workspace configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List checkpoints, failed markers and live resources
    Checkpoints(CheckpointsArgs),
    /// Show the resources stored in one checkpoint
    Show(ShowArgs),
    /// Check the frame of every stored resource
    Verify(VerifyArgs),
    /// Delete old checkpoints beyond a retention count
    Prune(PruneArgs),
}

#[derive(Args)]
pub struct CheckpointsArgs {
    /// Working root inside the store (defaults to the configured root)
    pub working_root: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    pub working_root: Option<String>,
    /// Checkpoint to show; `0` is the live root (default: newest)
    #[arg(short, long)]
    pub checkpoint: Option<u64>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub working_root: Option<String>,
    /// Only verify this checkpoint (default: every checkpoint and the live root)
    #[arg(short, long)]
    pub checkpoint: Option<u64>,
}

#[derive(Args)]
pub struct PruneArgs {
    pub working_root: Option<String>,
    /// Historical checkpoints to keep besides the newest
    #[arg(long)]
    pub retention: usize,
}
