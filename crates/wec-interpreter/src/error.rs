use wec_log::LogError;

/// Errors the Interpreter can surface to its caller. Step-level failures
/// are mediated by the on-failure policy (§7) and never reach here except
/// as the terminal `WorkflowAborted` outcome; these variants are the
/// fatal, non-mediated ones.
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    #[error("event log error: {0}")]
    Log(#[from] LogError),
}
