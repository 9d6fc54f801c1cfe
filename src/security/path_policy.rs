//! Path confinement for snippet includes.
//!
//! A snippet include names a file relative to the including skill. The
//! resolved file must stay inside the skill root the skill was loaded from,
//! after `..` segments and symlinks are resolved.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SwError};

/// Errors specific to path policy violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPolicyViolation {
    /// Path escapes the allowed root directory
    EscapesRoot { path: PathBuf, root: PathBuf },
    /// Absolute paths and drive prefixes are never accepted
    NotRelative { path: String },
    /// Path component contains invalid characters
    InvalidComponent { component: String, reason: String },
}

impl std::fmt::Display for PathPolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EscapesRoot { path, root } => {
                write!(f, "path {path:?} escapes root {root:?}")
            }
            Self::NotRelative { path } => write!(f, "path {path:?} must be relative"),
            Self::InvalidComponent { component, reason } => {
                write!(f, "invalid path component {component:?}: {reason}")
            }
        }
    }
}

impl std::error::Error for PathPolicyViolation {}

impl From<PathPolicyViolation> for SwError {
    fn from(violation: PathPolicyViolation) -> Self {
        Self::SecurityViolation(violation.to_string())
    }
}

/// Check the shape of a user-written relative path without touching the
/// filesystem.
pub fn check_relative(relative: &str) -> std::result::Result<(), PathPolicyViolation> {
    if relative.contains('\0') {
        return Err(PathPolicyViolation::InvalidComponent {
            component: relative.to_string(),
            reason: "contains null byte".to_string(),
        });
    }
    let path = Path::new(relative);
    if path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
    {
        return Err(PathPolicyViolation::NotRelative {
            path: relative.to_string(),
        });
    }
    Ok(())
}

/// Canonicalize a path and verify it stays within a root directory.
///
/// Both sides are canonicalized, so `..` segments and symlinks are resolved
/// before the containment check.
pub fn canonicalize_with_root(path: &Path, root: &Path) -> Result<PathBuf> {
    let canonical_root = root.canonicalize().map_err(|e| {
        SwError::SecurityViolation(format!("cannot canonicalize root {root:?}: {e}"))
    })?;
    let canonical_path = path.canonicalize()?;

    if !canonical_path.starts_with(&canonical_root) {
        return Err(PathPolicyViolation::EscapesRoot {
            path: canonical_path,
            root: canonical_root,
        }
        .into());
    }

    Ok(canonical_path)
}

/// Resolve `relative` against `base_dir`, confined to `root`.
///
/// Returns `Ok(None)` when the target does not exist so callers can report
/// a missing include in their own terms.
pub fn resolve_confined(base_dir: &Path, relative: &str, root: &Path) -> Result<Option<PathBuf>> {
    check_relative(relative)?;
    let joined = base_dir.join(relative);
    if !joined.exists() {
        // a dangling path may still be an escape attempt; report that first
        if !lexically_under(&joined, root) {
            return Err(PathPolicyViolation::EscapesRoot {
                path: joined,
                root: root.to_path_buf(),
            }
            .into());
        }
        return Ok(None);
    }
    canonicalize_with_root(&joined, root).map(Some)
}

fn lexically_under(path: &Path, root: &Path) -> bool {
    normalize_path(path).starts_with(normalize_path(root))
}

/// Normalize a path by removing `.` and resolving `..` lexically.
///
/// Does not touch the filesystem.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => match normalized.components().next_back() {
                None | Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => {
                    normalized.pop();
                }
            },
            Component::CurDir => {}
            _ => normalized.push(component),
        }
    }
    normalized
}
