use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gwsync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Reconcile API gateway configuration bundles", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a bundle to the gateway
    Apply(ApplyArgs),

    /// Show what applying a bundle would do (dry run)
    Plan(RunArgs),

    /// Print the order in which kinds are applied
    Order {
        /// Only order the kinds present in this bundle
        bundle: Option<PathBuf>,
    },

    /// List entity kinds with their identity and dependencies
    Kinds {
        /// Only show these kinds (comma-separated bundle keys)
        #[arg(value_delimiter = ',')]
        kinds: Vec<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments shared by `apply` and `plan`
#[derive(Args, Clone)]
pub struct RunArgs {
    /// Bundle file (JSON)
    pub bundle: PathBuf,

    /// Gateway snapshot file (default from config)
    #[arg(short, long, env = "GWSYNC_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Only apply these kinds (comma-separated bundle keys, e.g. folders,services)
    #[arg(short, long, value_delimiter = ',')]
    pub kinds: Vec<String>,

    /// Per-call timeout in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Preview changes without applying
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}
