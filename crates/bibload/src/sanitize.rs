//! Helpers for rendering paths in tracing spans and for validating
//! identifiers that become path components.
//!
//! Upload paths can contain user names or temporary directory layouts, so
//! spans only ever carry the file name.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Returns true if `value` can be used as a single directory name.
///
/// Institution ids, core names and job keys are joined onto storage roots,
/// so anything that could climb out of the root or create nested
/// directories is rejected.
pub fn is_safe_component(value: &str) -> bool {
    if value.is_empty() || value == "." || value == ".." {
        return false;
    }
    if value.starts_with('.') {
        return false;
    }
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_redact_path_returns_filename() {
        assert_eq!(
            redact_path(&PathBuf::from("/tmp/uploads/alice/records.xml.zip")),
            "records.xml.zip"
        );
    }

    #[test]
    fn test_redact_path_without_filename() {
        assert_eq!(redact_path(&PathBuf::from("/")), "<unknown>");
    }

    #[test]
    fn test_safe_component_accepts_ids() {
        assert!(is_safe_component("ub-leipzig"));
        assert!(is_safe_component("core_1.live"));
        assert!(is_safe_component("6f1c2a9e-1b1e-4c1d-9a51-8d0f2f1f5e55"));
    }

    #[test]
    fn test_safe_component_rejects_traversal() {
        assert!(!is_safe_component(""));
        assert!(!is_safe_component("."));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component(".hidden"));
        assert!(!is_safe_component("a/b"));
        assert!(!is_safe_component("a\\b"));
        assert!(!is_safe_component("with space"));
    }
}
