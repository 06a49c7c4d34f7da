//! Sandboxed path resolution
//!
//! Resolves a user-supplied relative path against a fixed root directory.
//! Containment is decided lexically, component by component, before any
//! filesystem call is made: nothing outside the root is ever touched, and
//! `/data` is never mistaken for a prefix of `/data-secret`.
//!
//! Symbolic links inside the root are not resolved; a link pointing outside
//! the root is followed by whatever I/O the caller performs.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Path resolution errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// Resolved path escapes the root, or the request is malformed
    #[error("Access denied")]
    AccessDenied,

    /// Sandbox root is a relative path (misconfiguration)
    #[error("Sandbox root must be an absolute path")]
    RootNotAbsolute,
}

/// Resolve `user_path` inside `root`
///
/// `.` and empty segments are dropped, `..` removes the previous segment and
/// a leading `/` means "the root". The result is `root` itself or a path
/// strictly under it; anything else is [`SandboxError::AccessDenied`].
pub fn resolve(root: &Path, user_path: &str) -> Result<PathBuf, SandboxError> {
    if !root.is_absolute() {
        return Err(SandboxError::RootNotAbsolute);
    }
    if user_path.contains('\0') {
        return Err(SandboxError::AccessDenied);
    }

    let root = normalize(root);
    let mut resolved = root.clone();

    for component in Path::new(user_path).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            // A drive letter or UNC prefix can only mean "somewhere else"
            Component::Prefix(_) => return Err(SandboxError::AccessDenied),
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(segment) => resolved.push(segment),
        }
    }

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(SandboxError::AccessDenied)
    }
}

/// Lexically normalize an absolute path (no filesystem access)
///
/// Roots handed to [`resolve`] are normalized the same way, so paths it
/// returns always have `normalize(root)` as a prefix.
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Render `path` relative to `root` with `/` separators
///
/// Returns an empty string for the root itself or for paths outside it.
pub fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|relative| {
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}
