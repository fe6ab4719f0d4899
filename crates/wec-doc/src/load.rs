use std::fs;
use std::path::Path;

use wec_core::{DocumentError, WorkflowDocument};

/// Read and parse a workflow document from disk.
///
/// Mirrors `load_aol_file`: the path must carry the expected suffix, the
/// file must be non-empty, and the body must parse against the document
/// schema.
pub fn load_document(path: impl AsRef<Path>) -> Result<WorkflowDocument, DocumentError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DocumentError::FileNotFound(path.display().to_string()));
    }

    let suffix_ok = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(".aol.toml") || name.ends_with(".aol"));
    if !suffix_ok {
        return Err(DocumentError::WrongSuffix(path.display().to_string()));
    }

    let raw = fs::read_to_string(path).map_err(|_| DocumentError::FileNotFound(path.display().to_string()))?;
    if raw.trim().is_empty() {
        return Err(DocumentError::EmptyFile(path.display().to_string()));
    }

    toml::from_str(&raw).map_err(|source| DocumentError::ParseError {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_doc(contents: &str, suffix: &str) -> tempfile::TempPath {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{contents}").unwrap();
        file.into_temp_path()
    }

    const MINIMAL: &str = r#"
[provider]
name = "Localhost"

[user_inputs]
prompt = "do the thing"

[[steps]]
id = "step_1"
description = "say hi"
extension = "Bash"

[steps.inputs]
command = "echo hi"
"#;

    #[test]
    fn rejects_missing_file() {
        let err = load_document("/no/such/file.aol.toml").unwrap_err();
        assert!(matches!(err, DocumentError::FileNotFound(_)));
    }

    #[test]
    fn rejects_wrong_suffix() {
        let path = write_doc(MINIMAL, ".txt");
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DocumentError::WrongSuffix(_)));
    }

    #[test]
    fn rejects_empty_file() {
        let path = write_doc("", ".aol.toml");
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DocumentError::EmptyFile(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let path = write_doc("this is not [ valid", ".aol.toml");
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DocumentError::ParseError { .. }));
    }

    #[test]
    fn loads_minimal_document() {
        let path = write_doc(MINIMAL, ".aol.toml");
        let doc = load_document(&path).unwrap();
        assert_eq!(doc.provider.name, "Localhost");
        assert_eq!(doc.steps.len(), 1);
        assert_eq!(doc.steps[0].id, "step_1");
    }

    #[test]
    fn rejects_unknown_fields() {
        let with_typo = r#"
[provider]
name = "Localhost"

[user_inputs]
prompt = "do the thing"
prmopt_typo = "oops"

[[steps]]
id = "step_1"
extension = "Bash"

[steps.inputs]
command = "echo hi"
"#;
        let path = write_doc(with_typo, ".aol.toml");
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DocumentError::ParseError { .. }));
    }
}
