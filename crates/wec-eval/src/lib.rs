//! C3: the Expression Evaluator.
//!
//! Two operations: variable interpolation of `{{id.key}}` references, and
//! boolean evaluation of condition expressions built from them. Both are
//! a hand-rolled left-to-right splitter rather than a proper parser, by
//! design (§9) — the quirky "first ` and ` wins over ` or `" precedence
//! is the observable behaviour, not a bug to fix.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use wec_context::ContextStore;

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("valid regex"));

/// Replace every `{{id.key}}` reference in `template` with its Context
/// Store value. References to unknown ids/keys, or malformed references
/// (no `.`), are left unchanged (§4.3, §7: expression errors are swallowed).
pub fn interpolate(ctx: &ContextStore, template: &str) -> String {
    REFERENCE_RE
        .replace_all(template, |caps: &regex::Captures| {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            resolve_reference(ctx, raw.trim()).unwrap_or_else(|| caps.get(0).unwrap().as_str().to_string())
        })
        .into_owned()
}

fn resolve_reference(ctx: &ContextStore, reference: &str) -> Option<String> {
    let (id, key) = reference.split_once('.')?;
    let value = ctx.get_value(id, key)?;
    Some(value_to_string(value))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Evaluate a boolean condition expression after interpolating its
/// `{{id.key}}` references (§4.3).
pub fn evaluate_condition(ctx: &ContextStore, expr: &str) -> bool {
    let interpolated = interpolate(ctx, expr);
    evaluate_interpolated(&interpolated)
}

fn evaluate_interpolated(expr: &str) -> bool {
    if let Some(idx) = expr.find(" and ") {
        let (left, right) = expr.split_at(idx);
        let right = &right[" and ".len()..];
        return evaluate_simple(left.trim()) && evaluate_simple(right.trim());
    }
    if let Some(idx) = expr.find(" or ") {
        let (left, right) = expr.split_at(idx);
        let right = &right[" or ".len()..];
        return evaluate_simple(left.trim()) || evaluate_simple(right.trim());
    }
    evaluate_simple(expr.trim())
}

const COMPARISON_OPERATORS: &[&str] = &[" >= ", " <= ", " == ", " != ", " contains ", " > ", " < "];

fn evaluate_simple(expr: &str) -> bool {
    let trimmed = expr.trim();

    if let Some(rest) = trimmed.strip_prefix("not ") {
        return !evaluate_simple(rest.trim());
    }

    for op in COMPARISON_OPERATORS {
        if let Some(idx) = trimmed.find(op) {
            let left = strip_quotes(trimmed[..idx].trim());
            let right = strip_quotes(trimmed[idx + op.len()..].trim());
            return apply_operator(op.trim(), left, right);
        }
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "true" => true,
        "false" => false,
        _ => !trimmed.is_empty(),
    }
}

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn apply_operator(op: &str, left: &str, right: &str) -> bool {
    match op {
        "==" => left == right,
        "!=" => left != right,
        "contains" => left.contains(right),
        ">" | ">=" | "<" | "<=" => {
            let (Ok(l), Ok(r)) = (left.parse::<f64>(), right.parse::<f64>()) else {
                return false;
            };
            match op {
                ">" => l > r,
                ">=" => l >= r,
                "<" => l < r,
                "<=" => l <= r,
                _ => unreachable!(),
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wec_core::{Entitlement, Provider, UserInputs};

    fn empty_store() -> ContextStore {
        ContextStore::new(
            &UserInputs {
                prompt: String::new(),
                resources: vec![],
            },
            &Provider {
                name: "Localhost".into(),
                context: HashMap::new(),
                entitlements: vec![Entitlement {
                    scope: "*".into(),
                    capability: "*".into(),
                }],
            },
        )
    }

    #[test]
    fn interpolation_is_idempotent_without_references() {
        let ctx = empty_store();
        let s = "no references here";
        assert_eq!(interpolate(&ctx, s), s);
    }

    #[test]
    fn interpolation_replaces_known_reference() {
        let mut ctx = empty_store();
        let result = wec_core::StepResult {
            stdout: "hello world".into(),
            stderr: String::new(),
            exit_code: 0,
            result: serde_json::Map::new(),
            is_error: false,
        };
        ctx.record_success("step_1", &result);
        assert_eq!(
            interpolate(&ctx, "Value is {{step_1.stdout}}"),
            "Value is hello world"
        );
        assert_eq!(
            interpolate(&ctx, "{{step_1.stdout}} and {{step_1.exit_code}}"),
            "hello world and 0"
        );
    }

    #[test]
    fn interpolation_leaves_unknown_reference_unchanged() {
        let ctx = empty_store();
        assert_eq!(interpolate(&ctx, "{{missing.key}}"), "{{missing.key}}");
    }

    #[test]
    fn interpolation_leaves_malformed_reference_unchanged() {
        let ctx = empty_store();
        assert_eq!(interpolate(&ctx, "{{no_dot_here}}"), "{{no_dot_here}}");
    }

    #[test]
    fn empty_string_equality_is_true() {
        assert!(evaluate_interpolated("\"\" == \"\""));
    }

    #[test]
    fn contains_checks_substring() {
        assert!(evaluate_interpolated("\"a\" contains \"a\""));
    }

    #[test]
    fn numeric_comparison_parses_both_sides() {
        assert!(evaluate_interpolated("\"1\" < \"2\""));
    }

    #[test]
    fn numeric_comparison_false_when_parse_fails() {
        assert!(!evaluate_interpolated("\"a\" < \"b\""));
    }

    #[test]
    fn and_binds_before_or_is_considered() {
        // "true and false or true": first " and " wins, splitting into the
        // simple conditions "true" and "false or true". The right side is
        // never re-split on " or " — as a literal it's just a non-empty
        // (hence truthy) string, so the whole expression is true. This is
        // the quirky, intentionally minimal precedence documented in §4.3.
        assert!(evaluate_interpolated("true and false or true"));
    }

    #[test]
    fn not_negates_simple_condition() {
        assert!(evaluate_interpolated("not false"));
        assert!(!evaluate_interpolated("not true"));
    }

    #[test]
    fn non_empty_string_is_truthy() {
        assert!(evaluate_interpolated("some-text"));
        assert!(!evaluate_interpolated(""));
    }

    #[test]
    fn condition_against_context_store() {
        let mut ctx = empty_store();
        let result = wec_core::StepResult {
            stdout: "success".into(),
            ..Default::default()
        };
        ctx.record_success("check", &result);
        assert!(evaluate_condition(&ctx, "\"{{check.stdout}}\" == \"success\""));
        assert!(!evaluate_condition(&ctx, "\"{{check.stdout}}\" == \"failure\""));
        assert!(evaluate_condition(&ctx, "\"{{check.stdout}}\" != \"failure\""));
        assert!(evaluate_condition(&ctx, "\"{{check.stdout}}\" contains \"suc\""));
    }
}
