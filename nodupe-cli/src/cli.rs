use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Thin command dispatch for NoDupeLabs. Argument parsing and subcommand
/// wiring live entirely in this crate; it exists only to route a typed
/// subcommand into direct calls on
/// `nodupe-catalog`/`nodupe-scan`/`nodupe-plan`/`nodupe-exec`.
#[derive(Debug, Parser)]
#[command(name = "nodupe", version, about = "Local-filesystem deduplication engine")]
pub struct Cli {
    /// Base directory holding catalog.db, audit logs, trash and backups.
    /// Defaults to `NODUPE_BASE_DIR` or the current directory.
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the scan pipeline over one or more roots.
    Scan {
        paths: Vec<PathBuf>,
        #[arg(long)]
        min_size: Option<u64>,
        #[arg(long)]
        max_size: Option<u64>,
        #[arg(long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
        #[arg(long)]
        verbose: bool,
    },
    /// Run the planner over the catalog's duplicate groups.
    Plan {
        #[arg(long, default_value = "newest")]
        strategy: String,
        #[arg(long, default_value = "plan.json")]
        output: PathBuf,
        /// Emit MOVE actions to this directory instead of DELETE.
        #[arg(long)]
        move_to: Option<PathBuf>,
        /// Emit HARDLINK actions instead of DELETE.
        #[arg(long)]
        hardlink: bool,
    },
    /// Execute a plan file.
    Apply {
        #[arg(long, default_value = "plan.json")]
        plan: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        yes: bool,
    },
    /// Undo previously-applied operations.
    Rollback {
        #[arg(long)]
        last: Option<usize>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        to: Option<u64>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Recompute hashes and compare against the catalog.
    Verify {
        /// Number of active files to sample; omit to verify all of them.
        #[arg(long)]
        sample: Option<usize>,
    },
    /// Bundle a list of files into an archive (presentation sink).
    Archive {
        paths: Vec<PathBuf>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Export the catalog as a JSON virtual view (presentation sink).
    Mount {
        #[arg(long, default_value = "catalog-view.json")]
        export: PathBuf,
    },
}
