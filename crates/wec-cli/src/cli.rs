use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// wec — Workflow Execution Core: runs declarative `.aol` workflow documents.
#[derive(Parser)]
#[command(name = "wec", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a prompt into a workflow document (out of scope: the
    /// Planner is not part of this interpreter).
    Plan {
        /// The natural-language request to plan.
        prompt: String,

        /// Where the planned `.aol` document would be written.
        output_path: PathBuf,
    },

    /// Load and run a workflow document to completion or abort.
    Execute {
        /// Path to the `.aol`/`.aol.toml` workflow document.
        aol_path: PathBuf,

        /// Resume from the document's existing Event Log instead of
        /// starting a fresh run.
        #[arg(long)]
        resume: bool,

        /// Directory holding the Event Log (default: `./.wec_logs`).
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },
}
