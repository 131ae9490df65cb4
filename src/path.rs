//! Logical path rules
//!
//! Paths are UTF-8, begin with `/`, and name directories with a trailing
//! `/`. The root header carries no path at all (the empty string). Segments
//! may escape `/` and `\` with a backslash; ordering is component-wise so a
//! directory always sorts before its contents.

use std::cmp::Ordering;

/// Maximum byte length of a single path segment.
pub const MAX_PATH_NAME_LENGTH: usize = 255;
/// Maximum number of path segments.
pub const MAX_PATH_LEVELS: usize = 6;
/// Maximum number of entries in a single directory.
pub const MAX_PATH_DIR_FILES_COUNT: usize = 4096;

/// A directory path ends with `/`; the empty root path is a directory too.
pub fn is_dir_path(path: &str) -> bool {
    path.is_empty() || path.ends_with('/')
}

/// Check the full path: leading slash, segment count, and each segment name.
pub fn is_valid_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    if path.is_empty() || !path.starts_with('/') {
        return false;
    }
    let parts = split_path(path);
    if parts.is_empty() || parts.len() > MAX_PATH_LEVELS {
        return false;
    }
    parts.iter().all(|name| is_valid_path_name(name))
}

/// Check a single segment name.
pub fn is_valid_path_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name.len() <= MAX_PATH_NAME_LENGTH
        && !name.starts_with("..")
        && !name.contains(['/', '\0'])
        && !name.trim().is_empty()
}

/// Split a path into segments, honoring backslash escapes inside a segment.
/// Leading and trailing slashes are ignored, so a directory path and its
/// file twin split identically.
pub fn split_path(path: &str) -> Vec<String> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);

    let mut parts = Vec::new();
    let mut part = String::new();
    let mut esc = false;
    for r in path.chars() {
        if esc {
            part.push(r);
            esc = false;
        } else if r == '\\' {
            esc = true;
        } else if r == '/' {
            parts.push(std::mem::take(&mut part));
        } else {
            part.push(r);
        }
    }
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

/// Component-wise path ordering. The empty root path sorts first; a shorter
/// path sorts before any path it prefixes.
pub fn path_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if a.is_empty() || b.is_empty() {
        return a.cmp(b);
    }
    let pa = split_path(a);
    let pb = split_path(b);
    for (x, y) in pa.iter().zip(pb.iter()) {
        match x.cmp(y) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }
    pa.len().cmp(&pb.len())
}

/// Strict component-wise "less" used for ordering checks.
pub fn path_less(a: &str, b: &str) -> bool {
    path_cmp(a, b) == Ordering::Less
}

/// Parent directory of a path, keeping the trailing slash. The parent of a
/// top-level entry is `/`; the parent of `/` is the root's empty path.
pub fn dirname(path: &str) -> &str {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(i) => &path[..i + 1],
        None => "",
    }
}
