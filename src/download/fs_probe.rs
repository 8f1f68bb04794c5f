//! Filesystem queries used by the planner and executor.
//!
//! Existence, size and modification time of a destination file, the write
//! permission of its directory, single-level directory creation, and filename
//! sanitization.

use std::io;
use std::path::Path;

use filetime::FileTime;

/// Size and modification time of an existing local file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFileState {
    /// File size in bytes.
    pub size: u64,
    /// Modification time as Unix seconds.
    pub modified: i64,
}

/// Returns true if anything exists at `path`.
#[must_use]
pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

/// Returns size and modification time of the file at `path`, if it exists.
#[must_use]
pub fn local_state(path: &Path) -> Option<LocalFileState> {
    let metadata = std::fs::metadata(path).ok()?;
    if !metadata.is_file() {
        return None;
    }
    Some(LocalFileState {
        size: metadata.len(),
        modified: FileTime::from_last_modification_time(&metadata).unix_seconds(),
    })
}

/// Sets the modification time of `path` to `unix_secs`, leaving the access time alone.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be updated.
pub fn set_modification_time(path: &Path, unix_secs: i64) -> io::Result<()> {
    filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0))
}

/// Returns true if the owner write bit is set on `dir`.
///
/// A directory that does not exist yet is judged by its parent, since it will
/// be created there.
#[must_use]
pub fn is_writable(dir: &Path) -> bool {
    let target = if dir.exists() {
        dir
    } else {
        match dir.parent() {
            Some(parent) if parent.as_os_str().is_empty() => Path::new("."),
            Some(parent) => parent,
            None => return false,
        }
    };
    match std::fs::metadata(target) {
        Ok(metadata) => has_owner_write(&metadata.permissions()),
        Err(_) => false,
    }
}

#[cfg(unix)]
fn has_owner_write(permissions: &std::fs::Permissions) -> bool {
    use std::os::unix::fs::PermissionsExt;
    permissions.mode() & 0o200 != 0
}

#[cfg(not(unix))]
fn has_owner_write(permissions: &std::fs::Permissions) -> bool {
    !permissions.readonly()
}

/// Creates `dir` if it is missing. Only the last component is created.
///
/// # Errors
///
/// Returns the IO error from `create_dir`, e.g. when the parent is missing.
pub fn ensure_directory(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    match std::fs::create_dir(dir) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        other => other,
    }
}

/// Replaces characters that break paths or shells.
///
/// `/ \ * & < >` become a single space; `:` becomes `" -"` so that
/// `"Title: Subtitle"` reads `"Title - Subtitle"`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let mut clean = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        match c {
            ':' => clean.push_str(" -"),
            '/' | '\\' | '*' | '&' | '<' | '>' => clean.push(' '),
            c => clean.push(c),
        }
    }
    clean
}
