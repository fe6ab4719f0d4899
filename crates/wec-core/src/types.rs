//! The workflow document data model (§3 of the specification).
//!
//! Values inside `inputs`/`context` mappings may be scalars, nested
//! mappings, or lists, so a generic JSON-like value is used — the
//! document format itself (`.aol`, TOML) is self-describing enough to
//! deserialize into it directly.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A scalar, mapping, or list value drawn from a workflow document.
pub type Value = serde_json::Value;

/// The full declarative description of provider, inputs, and steps.
///
/// `deny_unknown_fields` preserves the source schema's "reject unknown
/// fields" rule at the Loader boundary (§9) even though the rest of the
/// model is a plain tagged record, not a reflection-driven schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDocument {
    pub provider: Provider,
    pub user_inputs: UserInputs,
    pub steps: Vec<Step>,
}

/// The provider block: a name, free-form context, and entitlement rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Provider {
    pub name: String,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
}

/// The user_inputs block: the original prompt plus referenced resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserInputs {
    pub prompt: String,
    #[serde(default)]
    pub resources: Vec<String>,
}

/// A (scope, capability) entitlement rule, interpreted by the Entitlements Checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entitlement {
    pub scope: String,
    pub capability: String,
}

/// One unit of work or control, identified by a unique id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    /// Declared output keys and human-readable descriptions, used as
    /// validation hints (§4.7) and not as a type schema.
    #[serde(default)]
    pub outputs: HashMap<String, String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub on_failure: Option<OnFailure>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub loop_begin: Option<LoopBegin>,
    #[serde(default)]
    pub loop_end: Option<LoopEnd>,
    #[serde(default)]
    pub switch: Option<Switch>,
}

impl Step {
    /// Returns the distinguished control marker for this step, if any.
    ///
    /// A step carries at most one of `loop_begin`/`loop_end`/`switch`;
    /// callers that need to assert this invariant should use
    /// [`Step::control_marker_count`].
    pub fn control_marker(&self) -> Option<ControlMarker<'_>> {
        if let Some(lb) = &self.loop_begin {
            Some(ControlMarker::LoopBegin(lb))
        } else if let Some(le) = &self.loop_end {
            Some(ControlMarker::LoopEnd(le))
        } else if let Some(sw) = &self.switch {
            Some(ControlMarker::Switch(sw))
        } else {
            None
        }
    }

    pub fn control_marker_count(&self) -> usize {
        [
            self.loop_begin.is_some(),
            self.loop_end.is_some(),
            self.switch.is_some(),
        ]
        .iter()
        .filter(|x| **x)
        .count()
    }

    pub fn is_control(&self) -> bool {
        self.control_marker().is_some()
    }

    /// The tool to invoke, defaulting to `execute_command` per §4.5.
    pub fn tool_name(&self) -> &str {
        self.tool.as_deref().unwrap_or("execute_command")
    }
}

/// Borrowed view over a step's control marker.
#[derive(Debug, Clone, Copy)]
pub enum ControlMarker<'a> {
    LoopBegin(&'a LoopBegin),
    LoopEnd(&'a LoopEnd),
    Switch(&'a Switch),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopBegin {
    /// Non-negative; 0 means unbounded.
    #[serde(default)]
    pub max_iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopEnd {
    pub loop_id: String,
    pub exit_when: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Switch {
    pub value: String,
    #[serde(default)]
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub default: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchCase {
    #[serde(rename = "match")]
    pub match_value: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// Failure-handling policy attached to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OnFailure {
    pub strategy: FailureStrategy,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub fallback_step: Option<String>,
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    Abort,
    Retry,
    Skip,
    Fallback,
    SelfHeal,
}

impl Default for FailureStrategy {
    fn default() -> Self {
        Self::Abort
    }
}
