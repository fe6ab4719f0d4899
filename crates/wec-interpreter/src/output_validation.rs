use std::path::Path;

use wec_core::StepResult;

const FILE_INDICATORS: &[&str] = &[
    "file",
    "path",
    "output_file",
    "result_file",
    "image",
    "video",
    "audio",
    "pdf",
];

/// Validate a step's tool result against its declared `outputs` (§4.7).
///
/// Beyond the dispatcher's own `is_error` flag, a declared output whose
/// key or description reads like a file path is checked against the
/// filesystem: missing or empty is a validation failure.
pub fn validate_outputs(result: &StepResult, declared_outputs: &std::collections::HashMap<String, String>) -> Vec<String> {
    let mut errors = Vec::new();

    if result.is_error {
        let reason = if !result.stderr.is_empty() {
            result.stderr.clone()
        } else {
            result.stdout.clone()
        };
        errors.push(format!("step returned error: {reason}"));
    }

    for (output_key, description) in declared_outputs {
        if !is_file_output(output_key, description) {
            continue;
        }
        match extract_file_path(result, output_key) {
            Some(file_path) => {
                let path = Path::new(&file_path);
                if !path.exists() {
                    errors.push(format!("expected output file '{file_path}' does not exist"));
                } else if path.metadata().map(|m| m.len()).unwrap_or(0) == 0 {
                    errors.push(format!("output file '{file_path}' is empty"));
                }
            }
            None => {}
        }
    }

    errors
}

fn is_file_output(output_key: &str, description: &str) -> bool {
    let key_lower = output_key.to_ascii_lowercase();
    if FILE_INDICATORS.iter().any(|ind| key_lower.contains(ind)) {
        return true;
    }
    let desc_lower = description.to_ascii_lowercase();
    FILE_INDICATORS.iter().any(|ind| desc_lower.contains(ind))
}

fn extract_file_path(result: &StepResult, output_key: &str) -> Option<String> {
    if let Some(value) = result.result.get(output_key) {
        if let Some(s) = value.as_str() {
            if s.contains('/') || s.contains('\\') {
                return Some(s.to_string());
            }
        }
    }

    let stdout = result.stdout.trim();
    if !stdout.is_empty() && (stdout.contains('/') || stdout.contains('\\')) {
        let last_line = stdout.lines().last().unwrap_or("").trim();
        if !last_line.is_empty() && !last_line.starts_with('#') {
            return Some(last_line.to_string());
        }
    }

    None
}
