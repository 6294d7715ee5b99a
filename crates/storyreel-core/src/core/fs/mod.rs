//! Filesystem utilities.
//!
//! Crash-tolerant write primitives used by the file-backed stores and the
//! settings manager. A partial write must never leave a storyboard or a
//! settings file unreadable, so every write goes to a sibling temp file that
//! is then renamed over the destination.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Key Validation
// =============================================================================

/// Validates that a storage key or blob handle can be used as a file name.
///
/// Rejects empty keys, traversal sequences (`..`), path separators, drive
/// markers (`:`) and control characters.
pub fn validate_file_key(key: &str, label: &str) -> CoreResult<()> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationError(format!(
            "{label} is empty or contains only whitespace"
        )));
    }
    if trimmed.contains("..")
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains(':')
    {
        return Err(CoreError::ValidationError(format!(
            "Invalid {label}: contains path traversal characters"
        )));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(CoreError::ValidationError(format!(
            "Invalid {label}: contains control characters"
        )));
    }
    Ok(())
}

// =============================================================================
// Atomic Writes
// =============================================================================

/// Write bytes atomically (temp file + rename).
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = sibling_path(path, "tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    replace_with(path, &tmp_path)
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

/// Reads a file to a string, returning `None` when it does not exist.
pub fn read_to_string_if_exists(path: &Path) -> CoreResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CoreError::IoError(e)),
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| suffix.to_string());
    path.with_file_name(format!("{file_name}.{suffix}"))
}

fn replace_with(dest: &Path, tmp: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(tmp, dest)?;
        return Ok(());
    }

    // Rename-over-existing is not atomic on every platform; swap through a backup.
    let bak = sibling_path(dest, "bak");
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(tmp);
            Err(CoreError::IoError(e))
        }
    }
}
