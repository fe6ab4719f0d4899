use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use wec_core::DocumentError;

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("valid regex"));

const RESERVED_IDS: &[&str] = &["user_inputs", "provider"];

/// Extract every `{{step_id.output}}` reference embedded in `text`.
pub fn extract_variable_references(text: &str) -> Vec<String> {
    REFERENCE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
        .collect()
}

/// Validate that every reference resolves to a known step id and output
/// key already present in `context`, or to a reserved id (§9 supplement:
/// document-level forward-reference and output-existence checking).
pub fn validate_outputs_exist(
    context: &HashMap<String, HashMap<String, String>>,
    references: &[String],
) -> Result<(), DocumentError> {
    for reference in references {
        let Some((step_id, output_key)) = reference.split_once('.') else {
            return Err(DocumentError::InvalidReference {
                reference: reference.clone(),
                reason: "expected '<id>.<key>'".to_string(),
            });
        };

        if RESERVED_IDS.contains(&step_id) {
            continue;
        }

        match context.get(step_id) {
            None => {
                return Err(DocumentError::InvalidReference {
                    reference: reference.clone(),
                    reason: format!("step '{step_id}' not found in context"),
                })
            }
            Some(outputs) if !outputs.contains_key(output_key) => {
                return Err(DocumentError::InvalidReference {
                    reference: reference.clone(),
                    reason: format!("output '{output_key}' not found in step '{step_id}'"),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_multiple_references() {
        let refs = extract_variable_references("{{step_1.stdout}} and {{get_date.result}}");
        assert_eq!(refs, vec!["step_1.stdout".to_string(), "get_date.result".to_string()]);
    }

    #[test]
    fn extracts_nothing_from_plain_text() {
        assert!(extract_variable_references("no references here").is_empty());
    }

    #[test]
    fn reserved_ids_always_resolve() {
        let context = HashMap::new();
        let refs = vec!["user_inputs.prompt".to_string(), "provider.name".to_string()];
        assert!(validate_outputs_exist(&context, &refs).is_ok());
    }

    #[test]
    fn unknown_step_is_rejected() {
        let context = HashMap::new();
        let refs = vec!["missing_step.stdout".to_string()];
        let err = validate_outputs_exist(&context, &refs).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidReference { .. }));
    }

    #[test]
    fn unknown_output_key_is_rejected() {
        let mut context = HashMap::new();
        context.insert("step_1".to_string(), HashMap::from([("stdout".to_string(), String::new())]));
        let refs = vec!["step_1.missing_key".to_string()];
        let err = validate_outputs_exist(&context, &refs).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidReference { .. }));
    }

    #[test]
    fn malformed_reference_is_rejected() {
        let context = HashMap::new();
        let refs = vec!["no_dot_here".to_string()];
        let err = validate_outputs_exist(&context, &refs).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidReference { .. }));
    }
}
