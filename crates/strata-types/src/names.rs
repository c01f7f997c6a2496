//! Name validation for namespaces, resources and blob paths.
//!
//! Namespace and resource names become a single path segment
//! (`{namespace}_{resource}`), so they must:
//! - be non-empty
//! - not contain `/`, whitespace, control characters, `~`, `^`, `:`, `?`,
//!   `*`, `[` or `\`
//! - not start with `.`
//!
//! Blob paths are `/`-separated keys relative to a store root and must not
//! escape it.

use crate::error::{NameError, NameResult};

/// Characters that are forbidden anywhere in a segment name.
const FORBIDDEN_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

fn validate_segment(kind: &str, name: &str) -> NameResult<()> {
    if name.is_empty() {
        return Err(NameError::new(name, format!("{kind} name must not be empty")));
    }
    if name.contains('/') {
        return Err(NameError::new(name, format!("{kind} name must not contain '/'")));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| ch.is_whitespace() || ch.is_control() || FORBIDDEN_CHARS.contains(ch))
    {
        return Err(NameError::new(
            name,
            format!("{kind} name contains forbidden character: {ch:?}"),
        ));
    }
    if name.starts_with('.') {
        return Err(NameError::new(name, format!("{kind} name must not start with '.'")));
    }
    Ok(())
}

/// Validate a namespace name.
///
/// ```
/// use strata_types::validate_namespace_name;
///
/// assert!(validate_namespace_name("graph").is_ok());
/// assert!(validate_namespace_name("").is_err());
/// assert!(validate_namespace_name("a/b").is_err());
/// ```
pub fn validate_namespace_name(name: &str) -> NameResult<()> {
    validate_segment("namespace", name)
}

/// Validate a resource name. Same rules as namespaces.
pub fn validate_resource_name(name: &str) -> NameResult<()> {
    validate_segment("resource", name)
}

/// Validate a relative blob path.
pub fn validate_blob_path(path: &str) -> NameResult<()> {
    if path.is_empty() {
        return Err(NameError::new(path, "path must not be empty"));
    }
    if path.starts_with('/') {
        return Err(NameError::new(path, "path must be relative"));
    }
    for component in path.split('/') {
        if component.is_empty() {
            return Err(NameError::new(path, "path components must not be empty"));
        }
        if component == "." || component == ".." {
            return Err(NameError::new(
                path,
                format!("path must not contain {component:?} components"),
            ));
        }
        if component.contains('\\') || component.chars().any(char::is_control) {
            return Err(NameError::new(path, "path contains forbidden characters"));
        }
    }
    Ok(())
}
