use serde_json::{Map, Value};

/// The terminal result of running a workflow to completion or abort (§4.6, §8).
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Complete,
    Aborted {
        failed_step: String,
        payload: Map<String, Value>,
    },
}

impl WorkflowOutcome {
    /// The process exit code mandated by §6: 0 on completion, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Complete => 0,
            Self::Aborted { .. } => 1,
        }
    }
}
