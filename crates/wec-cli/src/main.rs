use anyhow::{bail, Result};
use clap::Parser;

mod cli;
mod run;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { .. } => {
            bail!(
                "planning is not implemented by this interpreter — `wec plan` compiles a \
                 prompt into an .aol document via a Planner, which is out of scope here; \
                 write (or generate) the document yourself and run `wec execute` on it"
            );
        }
        Commands::Execute { aol_path, resume, log_dir } => {
            let exit_code = run::execute(&aol_path, resume, log_dir)?;
            std::process::exit(exit_code);
        }
    }
}

/// Initialize `tracing` from `LOG_LEVEL` (§6: informational only, does
/// not affect semantics), defaulting to `info`.
fn init_tracing() {
    let filter = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init()
        .ok();
}
