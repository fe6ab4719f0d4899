//! C4: the Entitlements Checker.
//!
//! Decides allow/deny for a step's requested extension/tool and the
//! path-like inputs it references, against the workflow's declared
//! entitlement rules (§4.4).

mod paths;

pub use paths::extract_paths_from_inputs;

use wec_core::Entitlement;

/// Check a requested extension/tool invocation (optionally against a
/// specific path) against the declared entitlement rules.
///
/// An empty entitlements list is permissive (§4.4 rule 1).
pub fn verify_entitlements(
    entitlements: &[Entitlement],
    extension: &str,
    tool: &str,
    path: Option<&str>,
) -> (bool, String) {
    if entitlements.is_empty() {
        return (
            true,
            "no entitlements declared: permissive mode".to_string(),
        );
    }

    for entitlement in entitlements {
        if matches_capability(&entitlement.capability, extension, tool)
            && matches_scope(&entitlement.scope, path)
        {
            return (
                true,
                format!(
                    "allowed by entitlement (scope='{}', capability='{}')",
                    entitlement.scope, entitlement.capability
                ),
            );
        }
    }

    (
        false,
        match path {
            Some(p) => format!(
                "no entitlement permits extension '{extension}' tool '{tool}' on path '{p}'"
            ),
            None => format!("no entitlement permits extension '{extension}' tool '{tool}'"),
        },
    )
}

/// Capability match: `*`, exact (case-insensitive) match, or the
/// extension name mentioned as a whole word within the capability text.
pub fn matches_capability(capability: &str, extension: &str, _tool: &str) -> bool {
    if capability.trim() == "*" {
        return true;
    }
    if capability.eq_ignore_ascii_case(extension) {
        return true;
    }
    mentions_whole_word(capability, extension)
}

/// Scope match: `*`, an `Execute` mention when no path is given, or a
/// path-prefix match against the scope's embedded path fragment.
pub fn matches_scope(scope: &str, path: Option<&str>) -> bool {
    if scope.trim() == "*" {
        return true;
    }
    match path {
        None => mentions_whole_word_ci(scope, "execute"),
        Some(path) => match extract_path_fragment(scope) {
            Some(fragment) => path_is_descendant(path, fragment),
            None => false,
        },
    }
}

fn mentions_whole_word(haystack: &str, word: &str) -> bool {
    mentions_whole_word_ci(haystack, word)
}

fn mentions_whole_word_ci(haystack: &str, word: &str) -> bool {
    let haystack_lower = haystack.to_ascii_lowercase();
    let word_lower = word.to_ascii_lowercase();
    haystack_lower
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|token| token == word_lower)
}

/// Scan `scope` for the first whitespace-delimited token that looks like
/// a filesystem path (§4.4: a scan for the first token beginning with
/// `/`, `./`, `../`, or `~/`).
fn extract_path_fragment(scope: &str) -> Option<&str> {
    scope.split_whitespace().find(|token| {
        token.starts_with('/')
            || token.starts_with("./")
            || token.starts_with("../")
            || token.starts_with("~/")
    })
}

fn path_is_descendant(path: &str, scope_fragment: &str) -> bool {
    let normalized_path = normalize_path(&expand_tilde(path));
    let normalized_scope = normalize_path(&expand_tilde(scope_fragment));
    normalized_path == normalized_scope || normalized_path.starts_with(&format!("{normalized_scope}/"))
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home.trim_end_matches('/'), rest);
        }
    }
    path.to_string()
}

/// Lexically normalize a path: collapse `.` segments, resolve `..`
/// without touching the filesystem, and drop a trailing slash.
fn normalize_path(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if stack.last().is_some_and(|s| *s != "..") {
                    stack.pop();
                } else if !is_absolute {
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }
    let joined = stack.join("/");
    if is_absolute {
        format!("/{joined}")
    } else {
        joined
    }
}
