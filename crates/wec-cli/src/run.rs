use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use wec_extensions::Registry;
use wec_interpreter::Interpreter;
use wec_log::EventLog;

const DEFAULT_LOG_DIR: &str = ".wec_logs";

/// `wec execute` (§6): load, validate, and run a workflow document,
/// returning the process exit code (0 on `WORKFLOW_COMPLETE`, 1 otherwise).
pub fn execute(aol_path: &Path, resume: bool, log_dir: Option<PathBuf>) -> Result<i32> {
    let document = wec_doc::load_document(aol_path)
        .with_context(|| format!("failed to load {}", aol_path.display()))?;

    let registry = Registry::with_default_extensions();
    wec_doc::validate_dependencies(&document, &registry)
        .with_context(|| format!("{} failed validation", aol_path.display()))?;

    let log_path = event_log_path(aol_path, log_dir);
    let log_exists = log_path.exists();
    if resume && !log_exists {
        bail!(
            "--resume given but no event log found at {}",
            log_path.display()
        );
    }
    if !resume && log_exists {
        bail!(
            "event log already exists at {} — pass --resume to continue it, \
             or remove the file to start over",
            log_path.display()
        );
    }

    let log = EventLog::open_or_create(&log_path)
        .with_context(|| format!("failed to open event log {}", log_path.display()))?;

    info!(aol = %aol_path.display(), log = %log_path.display(), resume, "starting workflow");

    let mut interpreter = Interpreter::new(&document, &registry, log)
        .context("failed to initialize interpreter")?;
    let outcome = interpreter.run().context("workflow execution failed")?;

    match &outcome {
        wec_interpreter::WorkflowOutcome::Complete => {
            info!("workflow complete");
        }
        wec_interpreter::WorkflowOutcome::Aborted { failed_step, .. } => {
            info!(failed_step, "workflow aborted");
        }
    }

    Ok(outcome.exit_code())
}

/// Derive the Event Log path from the document's stem under `log_dir`
/// (default `./.wec_logs`), per §6's `<stem>.json` convention.
fn event_log_path(aol_path: &Path, log_dir: Option<PathBuf>) -> PathBuf {
    let stem = aol_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.trim_end_matches(".aol.toml").trim_end_matches(".aol"))
        .unwrap_or("workflow");
    let dir = log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));
    dir.join(format!("{stem}.jsonl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_strips_aol_toml_suffix() {
        let path = event_log_path(Path::new("workflows/hello.aol.toml"), None);
        assert_eq!(path, PathBuf::from(".wec_logs/hello.jsonl"));
    }

    #[test]
    fn log_path_strips_aol_suffix() {
        let path = event_log_path(Path::new("hello.aol"), None);
        assert_eq!(path, PathBuf::from(".wec_logs/hello.jsonl"));
    }

    #[test]
    fn log_path_honors_custom_dir() {
        let path = event_log_path(Path::new("hello.aol"), Some(PathBuf::from("/tmp/logs")));
        assert_eq!(path, PathBuf::from("/tmp/logs/hello.jsonl"));
    }
}
