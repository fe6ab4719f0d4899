//! C2: the in-memory Context Store.
//!
//! Maps step id -> that step's observable outputs, seeded at start with
//! the reserved `user_inputs` and `provider` entries (§4.2).

use serde_json::Value;
use std::collections::HashMap;
use wec_core::{Provider, StepResult, UserInputs};

const USER_INPUTS_ID: &str = "user_inputs";
const PROVIDER_ID: &str = "provider";

/// The Context Store: grows on success/skip, never shrinks, discarded at
/// process exit.
#[derive(Debug, Default)]
pub struct ContextStore {
    entries: HashMap<String, HashMap<String, Value>>,
}

impl ContextStore {
    /// Create a store seeded with the document's `user_inputs` and `provider` blocks.
    pub fn new(user_inputs: &UserInputs, provider: &Provider) -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            USER_INPUTS_ID.to_string(),
            HashMap::from([
                ("prompt".to_string(), Value::String(user_inputs.prompt.clone())),
                (
                    "resources".to_string(),
                    Value::Array(
                        user_inputs
                            .resources
                            .iter()
                            .cloned()
                            .map(Value::String)
                            .collect(),
                    ),
                ),
            ]),
        );
        entries.insert(
            PROVIDER_ID.to_string(),
            HashMap::from([
                ("name".to_string(), Value::String(provider.name.clone())),
                (
                    "context".to_string(),
                    Value::Object(provider.context.clone().into_iter().collect()),
                ),
            ]),
        );
        Self { entries }
    }

    /// Look up the full entry for a step id.
    pub fn get(&self, id: &str) -> Option<&HashMap<String, Value>> {
        self.entries.get(id)
    }

    /// Look up a single `id.key` value.
    pub fn get_value(&self, id: &str, key: &str) -> Option<&Value> {
        self.entries.get(id)?.get(key)
    }

    /// Record a successfully-executed step's normalized tool result.
    pub fn record_success(&mut self, step_id: &str, result: &StepResult) {
        self.entries
            .insert(step_id.to_string(), result.to_context_entry());
    }

    /// Record a skipped step (§4.6 step 1).
    pub fn record_skip(&mut self, step_id: &str) {
        self.entries.insert(
            step_id.to_string(),
            HashMap::from([("skipped".to_string(), Value::Bool(true))]),
        );
    }

    /// Record the current iteration count under a `loop_begin` step's id (§4.2).
    pub fn record_loop_counter(&mut self, loop_id: &str, counter: u32) {
        self.entries.insert(
            loop_id.to_string(),
            HashMap::from([("counter".to_string(), Value::String(counter.to_string()))]),
        );
    }

    /// Whether a no-op/control step has produced an entry (success or skip).
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use wec_core::Entitlement;

    fn provider() -> Provider {
        Provider {
            name: "Localhost".into(),
            context: Map::new(),
            entitlements: vec![Entitlement {
                scope: "*".into(),
                capability: "*".into(),
            }],
        }
    }

    fn inputs() -> UserInputs {
        UserInputs {
            prompt: "do it".into(),
            resources: vec!["./a.txt".into()],
        }
    }

    #[test]
    fn seeds_reserved_entries() {
        let store = ContextStore::new(&inputs(), &provider());
        assert_eq!(
            store.get_value("user_inputs", "prompt"),
            Some(&Value::String("do it".into()))
        );
        assert_eq!(
            store.get_value("provider", "name"),
            Some(&Value::String("Localhost".into()))
        );
    }

    #[test]
    fn records_success_with_required_fields() {
        let mut store = ContextStore::new(&inputs(), &provider());
        let result = StepResult {
            stdout: "  hello  ".into(),
            stderr: String::new(),
            exit_code: 0,
            result: serde_json::Map::new(),
            is_error: false,
        };
        store.record_success("s1", &result);
        let entry = store.get("s1").unwrap();
        assert_eq!(entry.get("stdout"), Some(&Value::String("hello".into())));
        assert_eq!(entry.get("exit_code"), Some(&Value::String("0".into())));
        assert_eq!(entry.get("is_error"), Some(&Value::Bool(false)));
    }

    #[test]
    fn records_skip_as_skipped_marker() {
        let mut store = ContextStore::new(&inputs(), &provider());
        store.record_skip("s2");
        assert_eq!(store.get("s2").unwrap().get("skipped"), Some(&Value::Bool(true)));
    }

    #[test]
    fn loop_counter_entry_is_decimal_string() {
        let mut store = ContextStore::new(&inputs(), &provider());
        store.record_loop_counter("L", 1);
        assert_eq!(
            store.get_value("L", "counter"),
            Some(&Value::String("1".into()))
        );
    }
}
