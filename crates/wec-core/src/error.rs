/// Document errors: raised by the Loader before the Interpreter starts.
///
/// These are fatal — a workflow that fails to load never executes a step.
#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    #[error("workflow file not found: {0}")]
    FileNotFound(String),

    #[error("expected .aol file, got: {0}")]
    WrongSuffix(String),

    #[error("empty workflow file: {0}")]
    EmptyFile(String),

    #[error("malformed workflow document in {path}: {source}")]
    ParseError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("step '{0}': duplicate step id")]
    DuplicateStepId(String),

    #[error("step '{step}': loop_end references unknown loop_id '{loop_id}'")]
    UnknownLoopId { step: String, loop_id: String },

    #[error("step '{step}': loop_end must come after loop_begin '{loop_id}'")]
    LoopEndBeforeBegin { step: String, loop_id: String },

    #[error(
        "step '{step}': expected loop_end for '{expected}', got '{found}' (invalid nesting)"
    )]
    LoopNestingViolation {
        step: String,
        expected: String,
        found: String,
    },

    #[error("loop '{loop_id}' (step index {index}) is never closed with loop_end")]
    UnclosedLoop { loop_id: String, index: usize },

    #[error("step '{step}': switch case references unknown step '{target}'")]
    UnknownSwitchTarget { step: String, target: String },

    #[error("step '{step}': fallback_step references unknown step '{target}'")]
    UnknownFallbackTarget { step: String, target: String },

    #[error("extension '{0}' is not registered")]
    UnknownExtension(String),

    #[error("reference '{reference}' is invalid: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("step '{referencer}' references step '{referenced}' which runs later")]
    ForwardReference {
        referencer: String,
        referenced: String,
    },

    #[error("step '{step}' has more than one control marker (loop_begin/loop_end/switch)")]
    MultipleControlMarkers { step: String },
}
