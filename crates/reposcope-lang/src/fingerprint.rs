//! Repository content fingerprints.

use std::path::Path;
use std::time::UNIX_EPOCH;

use reposcope_core::{Fingerprint, ScopeError};
use sha2::{Digest, Sha256};

/// Hash a repository's file listing into a [`Fingerprint`].
///
/// The digest covers `repo_id` and, for every non-hidden, non-ignored file in
/// sorted relative-path order, the path and its modification time. Adding,
/// removing, renaming or touching a file changes the fingerprint; file
/// contents are not read.
///
/// # Errors
///
/// Returns [`ScopeError::FileNotFound`] if `root` is not a directory.
///
/// # Examples
///
/// ```
/// use reposcope_lang::fingerprint::fingerprint_repo;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("app.py"), "def f(): pass").unwrap();
/// let a = fingerprint_repo(dir.path(), "app").unwrap();
/// let b = fingerprint_repo(dir.path(), "app").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
pub fn fingerprint_repo(root: &Path, repo_id: &str) -> Result<Fingerprint, ScopeError> {
    if !root.is_dir() {
        return Err(ScopeError::FileNotFound(root.to_path_buf()));
    }

    let mut listing: Vec<(String, u128)> = Vec::new();
    for entry in ignore::WalkBuilder::new(root).build() {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let mtime = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        listing.push((relative, mtime));
    }
    listing.sort();

    let mut hasher = Sha256::new();
    hasher.update(repo_id.as_bytes());
    hasher.update([0u8]);
    for (path, mtime) in &listing {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(mtime.to_le_bytes());
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Fingerprint::new(hex)
}
