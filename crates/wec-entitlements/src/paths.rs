use serde_json::Value;
use std::collections::HashMap;

const SKIPPED_KEYS: &[&str] = &["command", "script"];
const URL_SCHEMES: &[&str] = &["http://", "https://", "ftp://", "ftps://"];
const SHELL_METACHARACTERS: &[char] = &['|', ';', '`'];

/// Extract candidate filesystem paths from a step's input mapping (§4.4).
///
/// Skips `command`/`script` keys (shell strings, not paths), values
/// containing whitespace, URL schemes, or shell metacharacters, and
/// descends into nested mappings and lists.
pub fn extract_paths_from_inputs(inputs: &HashMap<String, Value>) -> Vec<String> {
    let mut paths = Vec::new();
    for (key, value) in inputs {
        if SKIPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        collect_paths(value, &mut paths);
    }
    paths
}

fn collect_paths(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if is_candidate_path(s) {
                out.push(s.clone());
            }
        }
        Value::Object(map) => {
            for (key, v) in map {
                if SKIPPED_KEYS.contains(&key.as_str()) {
                    continue;
                }
                collect_paths(v, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_paths(item, out);
            }
        }
        _ => {}
    }
}

fn is_candidate_path(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    if URL_SCHEMES.iter().any(|scheme| s.starts_with(scheme)) {
        return false;
    }
    if s.contains("&&") || s.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
        return false;
    }
    true
}
