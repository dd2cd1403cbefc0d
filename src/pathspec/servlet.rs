//! Servlet-style specs: `/exact`, `/prefix/*`, `*.ext`.

use super::{PathSpec, PathSpecError};

pub(super) fn parse(spec: &str) -> Result<PathSpec, PathSpecError> {
    if spec.is_empty() {
        return Err(PathSpecError::Empty);
    }

    if let Some(ext) = spec.strip_prefix("*.") {
        if ext.is_empty() || ext.contains('/') || ext.contains('*') {
            return Err(PathSpecError::InvalidSuffix(spec.to_string()));
        }
        return Ok(PathSpec::Suffix(ext.to_string()));
    }

    if !spec.starts_with('/') {
        return Err(PathSpecError::Unclassified(spec.to_string()));
    }

    match spec.strip_suffix("/*") {
        Some(prefix) => Ok(PathSpec::Prefix(prefix.to_string())),
        // Anything else, including a '*' in the middle, is a literal path.
        None => Ok(PathSpec::Exact(spec.to_string())),
    }
}

/// `"/a"` matches `/a`, `/a/` and `/a/...` but not `/ab`.
pub(super) fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub(super) fn suffix_matches(ext: &str, path: &str) -> bool {
    match path.strip_suffix(ext) {
        Some(head) => head.ends_with('.'),
        None => false,
    }
}
