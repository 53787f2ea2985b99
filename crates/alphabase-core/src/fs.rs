//! Filesystem utilities for atomic store writes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AlphaError, Result};

/// Rename `temp_path` over `destination`.
///
/// Only when the platform refuses to replace an existing file is the
/// destination removed and the rename retried. Any other failure leaves the
/// destination untouched. The temp file is cleaned up if the rename fails.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    let initial_err = match fs::rename(temp_path, destination) {
        Ok(()) => return Ok(()),
        Err(err) if replace_refused(&err) => err,
        Err(err) => {
            let _ = fs::remove_file(temp_path);
            return Err(err);
        }
    };
    let _ = fs::remove_file(destination);
    fs::rename(temp_path, destination).map_err(|retry_err| {
        let _ = fs::remove_file(temp_path);
        io::Error::new(
            retry_err.kind(),
            format!(
                "Atomic rename failed (initial: {}, retry: {})",
                initial_err, retry_err
            ),
        )
    })
}

#[cfg(windows)]
fn replace_refused(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
    )
}

// rename(2) replaces the destination atomically; a failure is real.
#[cfg(not(windows))]
fn replace_refused(_err: &io::Error) -> bool {
    false
}

/// Write `data` to `path` so readers see either the old or the new contents.
///
/// The bytes go to a uniquely named sibling temp file, are synced, and the
/// temp file is renamed over the target. Parent directories are created.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| {
        AlphaError::Storage(format!(
            "Failed to create directory {}: {}",
            parent.display(),
            e
        ))
    })?;

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AlphaError::Storage(format!("System time error: {}", e)))?
        .as_nanos();
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AlphaError::Storage(format!("Invalid store path: {}", path.display())))?;
    let temp_path = parent.join(format!(".{}.{}.tmp", filename, nanos));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .map_err(|e| AlphaError::Storage(format!("Temp file create failed: {}", e)))?;
    let written = file.write_all(data).and_then(|_| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(AlphaError::Storage(format!("Temp file write failed: {}", e)));
    }

    rename_with_fallback(&temp_path, path)
        .map_err(|e| AlphaError::Storage(format!("Atomic rename failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_rename_overwrites_existing() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("temp.json");
        let dest = dir.path().join("dest.json");

        File::create(&dest).unwrap().write_all(b"old").unwrap();
        File::create(&temp).unwrap().write_all(b"new").unwrap();

        rename_with_fallback(&temp, &dest).unwrap();

        assert!(!temp.exists());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "new");
    }

    #[test]
    fn test_failed_rename_keeps_destination() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.tmp");
        let dest = dir.path().join("dest.json");
        File::create(&dest).unwrap().write_all(b"old").unwrap();

        assert!(rename_with_fallback(&missing, &dest).is_err());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "old");
    }

    #[test]
    fn test_failed_rename_onto_directory_cleans_temp() {
        let dir = tempdir().unwrap();
        let temp = dir.path().join("temp.json");
        let dest = dir.path().join("occupied");
        fs::create_dir(&dest).unwrap();
        File::create(dest.join("keep")).unwrap().write_all(b"kept").unwrap();
        File::create(&temp).unwrap().write_all(b"new").unwrap();

        assert!(rename_with_fallback(&temp, &dest).is_err());
        assert!(!temp.exists());
        assert_eq!(fs::read_to_string(dest.join("keep")).unwrap(), "kept");
    }

    #[test]
    fn test_write_atomic_creates_parents_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("nested").join("db.json");

        write_atomic(&dest, b"{\"a\":1}").unwrap();
        write_atomic(&dest, b"{\"a\":2}").unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "{\"a\":2}");
        let leftovers: Vec<_> = fs::read_dir(dest.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
