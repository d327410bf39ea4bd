//! Lexical path-scoping check for router step 5 (spec §4.F).
//!
//! Resolution is purely lexical — it never touches the filesystem, so a
//! `write_file` target that does not exist yet can still be scoped.

use std::path::{Component, Path, PathBuf};

/// Join `candidate` onto `workdir` and collapse `.`/`..` segments. Returns
/// `None` if the result would escape `workdir` (an absolute path outside
/// it, or enough `..` segments to climb past the root).
#[must_use]
pub fn resolve_within(workdir: &str, candidate: &str) -> Option<PathBuf> {
    let workdir = Path::new(workdir);
    let joined = if Path::new(candidate).is_absolute() {
        PathBuf::from(candidate)
    } else {
        workdir.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.starts_with(workdir) {
        Some(normalized)
    } else {
        None
    }
}

/// Pull the path-bearing argument out of a capability call's `args`, per
/// the field names router step 5 recognizes.
#[must_use]
pub fn extract_path_arg(args: &serde_json::Value) -> Option<&str> {
    for field in ["path", "file_path", "directory", "cwd"] {
        if let Some(value) = args.get(field).and_then(serde_json::Value::as_str) {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_under_workdir_resolves() {
        let resolved = resolve_within("/work", "notes/a.txt").unwrap();
        assert_eq!(resolved, Path::new("/work/notes/a.txt"));
    }

    #[test]
    fn parent_traversal_past_workdir_is_rejected() {
        assert!(resolve_within("/work", "../etc/passwd").is_none());
    }

    #[test]
    fn absolute_path_outside_workdir_is_rejected() {
        assert!(resolve_within("/work", "/etc/passwd").is_none());
    }

    #[test]
    fn traversal_that_stays_inside_workdir_is_allowed() {
        let resolved = resolve_within("/work", "a/../b.txt").unwrap();
        assert_eq!(resolved, Path::new("/work/b.txt"));
    }

    #[test]
    fn extract_path_arg_checks_known_field_names_in_order() {
        let args = serde_json::json!({"directory": "./src"});
        assert_eq!(extract_path_arg(&args), Some("./src"));
    }
}
