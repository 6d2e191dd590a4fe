//! Component path handling: safety checks and URL encoding.
//!
//! Component paths are always bag-relative and `/`-separated. The empty
//! string denotes the resource root.

use crate::error::{BagError, BagResult};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::path::{Component, Path, PathBuf};

/// Characters left unescaped in identifiers and download URLs.
const PATH_SEGMENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

/// Validate a component path and return its normalized form.
///
/// Rejects absolute paths and any path that climbs above the root once
/// `.` and `..` segments are resolved. `"a/./b"` normalizes to `"a/b"`,
/// `"a/../b"` to `"b"`; `"a/../../b"` fails.
pub fn validate_relpath(path: &str) -> BagResult<String> {
    let p = Path::new(path);
    if p.is_absolute() || path.starts_with('/') {
        return Err(BagError::path_safety(path, "absolute paths not allowed"));
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in p.components() {
        match component {
            Component::Normal(seg) => {
                let seg = seg.to_str().ok_or_else(|| {
                    BagError::path_safety(path, "path is not valid UTF-8")
                })?;
                parts.push(seg);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(BagError::path_safety(
                        path,
                        "path climbs outside of the bag",
                    ));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(BagError::path_safety(path, "absolute paths not allowed"));
            }
        }
    }
    Ok(parts.join("/"))
}

/// Percent-encode a component path for use in an identifier or URL.
///
/// Path separators survive; space, `%`, `+` and other reserved characters
/// are escaped.
pub fn encode_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SEGMENT_SET).to_string()
}

/// Join a normalized component path onto a base directory.
pub(crate) fn join_relpath(base: &Path, relpath: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for seg in relpath.split('/').filter(|s| !s.is_empty()) {
        out.push(seg);
    }
    out
}

/// Parent of a normalized component path (`""` for top-level entries).
pub(crate) fn parent_of(relpath: &str) -> &str {
    relpath.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

/// Final segment of a normalized component path.
pub(crate) fn basename_of(relpath: &str) -> &str {
    relpath.rsplit_once('/').map(|(_, b)| b).unwrap_or(relpath)
}

/// Ancestors of a component path, nearest last, excluding the root.
///
/// `"a/b/c"` yields `["a", "a/b"]`.
pub(crate) fn ancestors_of(relpath: &str) -> Vec<String> {
    let segs: Vec<&str> = relpath.split('/').filter(|s| !s.is_empty()).collect();
    (1..segs.len()).map(|n| segs[..n].join("/")).collect()
}

/// Convert a path under `base` into a `/`-separated relative string.
pub(crate) fn relative_to(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let segs: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Some(segs.join("/"))
}
