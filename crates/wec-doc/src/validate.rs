use std::collections::{HashMap, HashSet};

use wec_core::{DocumentError, Step, WorkflowDocument};
use wec_extensions::Registry;

use crate::references::{extract_variable_references, validate_outputs_exist};

/// The output keys every executed step implicitly exposes in the Context
/// Store, regardless of its declared `outputs` (§4.2, §8 invariant 1).
const IMPLICIT_OUTPUT_KEYS: &[&str] = &["stdout", "stderr", "exit_code", "result", "is_error"];

/// Run every structural check that must pass before a document may be
/// interpreted (§4.1): duplicate ids, registered extensions, loop
/// nesting, switch/fallback/loop_end references, and (the §9 supplements)
/// forward references and dangling output references.
pub fn validate_dependencies(doc: &WorkflowDocument, registry: &Registry) -> Result<(), DocumentError> {
    validate_unique_ids(&doc.steps)?;
    validate_control_markers(&doc.steps)?;
    validate_extensions(&doc.steps, registry)?;
    validate_step_references(&doc.steps)?;
    validate_loop_structure(&doc.steps)?;
    validate_forward_references(&doc.steps)?;
    validate_declared_outputs(&doc.steps)?;
    Ok(())
}

fn validate_unique_ids(steps: &[Step]) -> Result<(), DocumentError> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.id.as_str()) {
            return Err(DocumentError::DuplicateStepId(step.id.clone()));
        }
    }
    Ok(())
}

fn validate_control_markers(steps: &[Step]) -> Result<(), DocumentError> {
    for step in steps {
        if step.control_marker_count() > 1 {
            return Err(DocumentError::MultipleControlMarkers { step: step.id.clone() });
        }
    }
    Ok(())
}

fn validate_extensions(steps: &[Step], registry: &Registry) -> Result<(), DocumentError> {
    let required: HashSet<&str> = steps
        .iter()
        .filter_map(|step| step.extension.as_deref())
        .collect();
    for extension in required {
        if !registry.contains(extension) {
            return Err(DocumentError::UnknownExtension(extension.to_string()));
        }
    }
    Ok(())
}

fn validate_step_references(steps: &[Step]) -> Result<(), DocumentError> {
    let ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();

    for step in steps {
        if let Some(loop_end) = &step.loop_end {
            if !ids.contains(loop_end.loop_id.as_str()) {
                return Err(DocumentError::UnknownLoopId {
                    step: step.id.clone(),
                    loop_id: loop_end.loop_id.clone(),
                });
            }
        }

        if let Some(switch) = &step.switch {
            for case in &switch.cases {
                for target in &case.steps {
                    if !ids.contains(target.as_str()) {
                        return Err(DocumentError::UnknownSwitchTarget {
                            step: step.id.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
            if let Some(default) = &switch.default {
                for target in default {
                    if !ids.contains(target.as_str()) {
                        return Err(DocumentError::UnknownSwitchTarget {
                            step: step.id.clone(),
                            target: target.clone(),
                        });
                    }
                }
            }
        }

        if let Some(on_failure) = &step.on_failure {
            if let Some(fallback) = &on_failure.fallback_step {
                if !ids.contains(fallback.as_str()) {
                    return Err(DocumentError::UnknownFallbackTarget {
                        step: step.id.clone(),
                        target: fallback.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn validate_loop_structure(steps: &[Step]) -> Result<(), DocumentError> {
    let mut stack: Vec<(&str, usize)> = Vec::new();
    let mut begins: HashMap<&str, usize> = HashMap::new();

    for (idx, step) in steps.iter().enumerate() {
        if step.loop_begin.is_some() {
            stack.push((step.id.as_str(), idx));
            begins.insert(step.id.as_str(), idx);
        }

        if let Some(loop_end) = &step.loop_end {
            let loop_id = loop_end.loop_id.as_str();

            let Some(&begin_idx) = begins.get(loop_id) else {
                return Err(DocumentError::UnknownLoopId {
                    step: step.id.clone(),
                    loop_id: loop_id.to_string(),
                });
            };

            if begin_idx >= idx {
                return Err(DocumentError::LoopEndBeforeBegin {
                    step: step.id.clone(),
                    loop_id: loop_id.to_string(),
                });
            }

            if let Some(&(expected_id, _)) = stack.last() {
                if loop_id != expected_id {
                    return Err(DocumentError::LoopNestingViolation {
                        step: step.id.clone(),
                        expected: expected_id.to_string(),
                        found: loop_id.to_string(),
                    });
                }
                stack.pop();
            }
        }
    }

    if let Some(&(loop_id, idx)) = stack.first() {
        return Err(DocumentError::UnclosedLoop {
            loop_id: loop_id.to_string(),
            index: idx,
        });
    }
    Ok(())
}

/// §9 supplement: a step's inputs/condition may not reference a step id
/// that appears later in document order (the Context Store would not
/// yet hold that entry when this step runs).
fn validate_forward_references(steps: &[Step]) -> Result<(), DocumentError> {
    let position: HashMap<&str, usize> = steps.iter().enumerate().map(|(idx, s)| (s.id.as_str(), idx)).collect();

    for (idx, step) in steps.iter().enumerate() {
        let mut texts = Vec::new();
        if let Some(condition) = &step.condition {
            texts.push(condition.as_str());
        }
        for value in step.inputs.values() {
            collect_strings(value, &mut texts);
        }

        for text in texts {
            for reference in extract_variable_references(text) {
                let Some((referenced_id, _)) = reference.split_once('.') else {
                    continue;
                };
                if referenced_id == "user_inputs" || referenced_id == "provider" {
                    continue;
                }
                if let Some(&referenced_idx) = position.get(referenced_id) {
                    if referenced_idx >= idx {
                        return Err(DocumentError::ForwardReference {
                            referencer: step.id.clone(),
                            referenced: referenced_id.to_string(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// §9 supplement (`validate_outputs_exist`): every `{{id.key}}` reference
/// in the document must resolve against the *declared* outputs of step
/// `id` (its implicit `stdout`/`stderr`/`exit_code`/`result`/`is_error`
/// keys plus whatever `step.outputs` names), at Loader time.
fn validate_declared_outputs(steps: &[Step]) -> Result<(), DocumentError> {
    let context: HashMap<String, HashMap<String, String>> = steps
        .iter()
        .map(|step| {
            let mut keys: HashMap<String, String> = IMPLICIT_OUTPUT_KEYS
                .iter()
                .map(|k| (k.to_string(), String::new()))
                .collect();
            if step.loop_begin.is_some() {
                keys.insert("counter".to_string(), String::new());
            }
            keys.extend(step.outputs.clone());
            (step.id.clone(), keys)
        })
        .collect();

    let mut references = Vec::new();
    for step in steps {
        if let Some(condition) = &step.condition {
            references.extend(extract_variable_references(condition));
        }
        if let Some(loop_end) = &step.loop_end {
            references.extend(extract_variable_references(&loop_end.exit_when));
        }
        if let Some(switch) = &step.switch {
            references.extend(extract_variable_references(&switch.value));
        }
        let mut texts = Vec::new();
        for value in step.inputs.values() {
            collect_strings(value, &mut texts);
        }
        for text in texts {
            references.extend(extract_variable_references(text));
        }
    }

    validate_outputs_exist(&context, &references)
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<&str>) {
    match value {
        serde_json::Value::String(s) => out.push(s.as_str()),
        serde_json::Value::Object(map) => {
            for v in map.values() {
                collect_strings(v, out);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;
    use wec_core::{Entitlement, LoopBegin, LoopEnd, OnFailure, FailureStrategy, Provider, Switch, SwitchCase, UserInputs};

    fn provider() -> Provider {
        Provider {
            name: "Localhost".into(),
            context: Map::new(),
            entitlements: vec![Entitlement { scope: "*".into(), capability: "*".into() }],
        }
    }

    fn inputs() -> UserInputs {
        UserInputs { prompt: "go".into(), resources: vec![] }
    }

    fn bare_step(id: &str) -> Step {
        Step {
            id: id.to_string(),
            description: None,
            extension: Some("Bash".into()),
            tool: None,
            inputs: Map::new(),
            outputs: Map::new(),
            condition: None,
            on_failure: None,
            timeout: None,
            loop_begin: None,
            loop_end: None,
            switch: None,
        }
    }

    fn doc(steps: Vec<Step>) -> WorkflowDocument {
        WorkflowDocument { provider: provider(), user_inputs: inputs(), steps }
    }

    #[test]
    fn accepts_well_formed_document() {
        let registry = Registry::with_default_extensions();
        let d = doc(vec![bare_step("step_1")]);
        assert!(validate_dependencies(&d, &registry).is_ok());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let registry = Registry::with_default_extensions();
        let d = doc(vec![bare_step("step_1"), bare_step("step_1")]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::DuplicateStepId(_))
        ));
    }

    #[test]
    fn rejects_unregistered_extension() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_1");
        step.extension = Some("Nope".into());
        let d = doc(vec![step]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::UnknownExtension(_))
        ));
    }

    #[test]
    fn rejects_unknown_loop_end_target() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_1");
        step.loop_end = Some(LoopEnd { loop_id: "missing".into(), exit_when: "true".into() });
        let d = doc(vec![step]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::UnknownLoopId { .. })
        ));
    }

    #[test]
    fn rejects_loop_end_before_begin() {
        let registry = Registry::with_default_extensions();
        let mut end = bare_step("loop_end_step");
        end.loop_end = Some(LoopEnd { loop_id: "loop_begin_step".into(), exit_when: "true".into() });
        let mut begin = bare_step("loop_begin_step");
        begin.loop_begin = Some(LoopBegin { max_iterations: 0 });
        let d = doc(vec![end, begin]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::LoopEndBeforeBegin { .. })
        ));
    }

    #[test]
    fn rejects_unclosed_loop() {
        let registry = Registry::with_default_extensions();
        let mut begin = bare_step("loop_begin_step");
        begin.loop_begin = Some(LoopBegin { max_iterations: 0 });
        let d = doc(vec![begin, bare_step("step_1")]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::UnclosedLoop { .. })
        ));
    }

    #[test]
    fn rejects_interleaved_loop_nesting() {
        let registry = Registry::with_default_extensions();
        let mut outer_begin = bare_step("outer");
        outer_begin.loop_begin = Some(LoopBegin { max_iterations: 0 });
        let mut inner_begin = bare_step("inner");
        inner_begin.loop_begin = Some(LoopBegin { max_iterations: 0 });
        let mut outer_end = bare_step("outer_end");
        outer_end.loop_end = Some(LoopEnd { loop_id: "outer".into(), exit_when: "true".into() });
        let mut inner_end = bare_step("inner_end");
        inner_end.loop_end = Some(LoopEnd { loop_id: "inner".into(), exit_when: "true".into() });
        let d = doc(vec![outer_begin, inner_begin, outer_end, inner_end]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::LoopNestingViolation { .. })
        ));
    }

    #[test]
    fn rejects_unknown_switch_target() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_1");
        step.switch = Some(Switch {
            value: "{{x.y}}".into(),
            cases: vec![SwitchCase { match_value: "a".into(), steps: vec!["missing".into()] }],
            default: None,
        });
        let d = doc(vec![step]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::UnknownSwitchTarget { .. })
        ));
    }

    #[test]
    fn rejects_unknown_fallback_target() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_1");
        step.on_failure = Some(OnFailure {
            strategy: FailureStrategy::Fallback,
            max_retries: 3,
            fallback_step: Some("missing".into()),
        });
        let d = doc(vec![step]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::UnknownFallbackTarget { .. })
        ));
    }

    #[test]
    fn rejects_multiple_control_markers_on_one_step() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_1");
        step.loop_begin = Some(LoopBegin { max_iterations: 0 });
        step.switch = Some(Switch { value: "{{x.y}}".into(), cases: vec![], default: None });
        let d = doc(vec![step]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::MultipleControlMarkers { .. })
        ));
    }

    #[test]
    fn rejects_forward_reference_in_inputs() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_1");
        step.inputs = Map::from([("command".to_string(), serde_json::json!("echo {{step_2.stdout}}"))]);
        let d = doc(vec![step, bare_step("step_2")]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::ForwardReference { .. })
        ));
    }

    #[test]
    fn allows_backward_reference_in_inputs() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_2");
        step.inputs = Map::from([("command".to_string(), serde_json::json!("echo {{step_1.stdout}}"))]);
        let d = doc(vec![bare_step("step_1"), step]);
        assert!(validate_dependencies(&d, &registry).is_ok());
    }

    #[test]
    fn allows_reference_to_implicit_output_key() {
        let registry = Registry::with_default_extensions();
        let mut step = bare_step("step_2");
        step.inputs = Map::from([("command".to_string(), serde_json::json!("echo {{step_1.exit_code}}"))]);
        let d = doc(vec![bare_step("step_1"), step]);
        assert!(validate_dependencies(&d, &registry).is_ok());
    }

    #[test]
    fn rejects_reference_to_undeclared_output_key() {
        let registry = Registry::with_default_extensions();
        let mut producer = bare_step("step_1");
        producer.outputs = Map::from([("summary".to_string(), "a summary".to_string())]);
        let mut consumer = bare_step("step_2");
        consumer.inputs =
            Map::from([("command".to_string(), serde_json::json!("echo {{step_1.report}}"))]);
        let d = doc(vec![producer, consumer]);
        assert!(matches!(
            validate_dependencies(&d, &registry),
            Err(DocumentError::InvalidReference { .. })
        ));
    }

    #[test]
    fn allows_reference_to_loop_counter() {
        let registry = Registry::with_default_extensions();
        let mut begin = bare_step("L");
        begin.loop_begin = Some(LoopBegin { max_iterations: 0 });
        let mut end = bare_step("loop_end_step");
        end.loop_end = Some(LoopEnd { loop_id: "L".into(), exit_when: "\"{{L.counter}}\" >= \"3\"".into() });
        let d = doc(vec![begin, end]);
        assert!(validate_dependencies(&d, &registry).is_ok());
    }
}
