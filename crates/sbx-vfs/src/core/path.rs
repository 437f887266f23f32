//! Path utilities for the guest filesystem.
//!
//! The 9P handle resolves every path from the guest root, so `a/b` and `/a/b`
//! name the same entry. Helpers here keep whatever form the caller used, since
//! listings echo paths back in the caller's spelling.

/// Iterate the non-empty segments of a path (`.` segments are skipped).
pub fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Get the parent path of a given path.
///
/// Returns `"/"` for top-level absolute paths and `""` for top-level relative
/// paths (both resolve to the guest root).
pub fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.starts_with('/') {
            String::from("/")
        } else {
            String::new()
        };
    }

    match trimmed.rfind('/') {
        Some(0) => String::from("/"),
        Some(pos) => String::from(&trimmed[..pos]),
        None => String::new(),
    }
}

/// Join a base path and an entry name.
pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        String::from(name)
    } else if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}
