//! Filesystem utilities.
//!
//! Crash-tolerant write primitives shared by the file-backed key-value store,
//! the settings manager and export writers. A partial write (power loss,
//! crash) must never leave a stored entity list half-written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Name Validation
// =============================================================================

/// Validates that a storage key or namespace is safe to use as a file name.
///
/// Rejects empty names, path traversal sequences, path separators, drive
/// letter indicators and control characters.
pub fn validate_name_component(name: &str, label: &str) -> CoreResult<()> {
    let trimmed = name.trim();
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

/// Write bytes atomically: temp file, fsync, then rename over the destination.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_path_for(path);
    {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    atomic_replace(path, &tmp_path)?;
    Ok(())
}

/// Write a JSON file atomically with pretty formatting.
pub fn atomic_write_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    atomic_write_bytes(path, &bytes)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "tmp")
}

fn bak_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, "bak")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut sibling = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| suffix.to_string());
    sibling.set_file_name(format!("{file_name}.{suffix}"));
    sibling
}

fn atomic_replace(dest: &Path, src_tmp: &Path) -> CoreResult<()> {
    if !dest.exists() {
        std::fs::rename(src_tmp, dest)?;
        return Ok(());
    }

    // Windows: rename-over-existing may fail depending on filesystem; use a backup swap.
    let bak = bak_path_for(dest);
    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(CoreError::IoError(e))
        }
    }
}
