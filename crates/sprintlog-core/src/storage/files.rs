//! Atomic file output
//!
//! Exports, snapshots and the fetched archive cache are written to a
//! temporary sibling first and then renamed, so a reader never sees a
//! partially written file.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::error::{StoreError, StoreResult};

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    // Same directory, so the rename stays on one filesystem
    let temp_path = path.with_extension("tmp");

    let write = |temp: &Path| -> std::io::Result<()> {
        let mut file = File::create(temp)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(temp, path)
    };

    write(&temp_path).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        StoreError::WriteError {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("a").join("b").join("export.pdf");

        atomic_write(&nested_path, b"%PDF-1.3").unwrap();

        assert!(nested_path.exists());
        assert_eq!(fs::read(&nested_path).unwrap(), b"%PDF-1.3");
        assert!(!nested_path.with_extension("tmp").exists());
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("archive_cache.xlsx");

        atomic_write(&path, b"old").unwrap();
        atomic_write(&path, b"new contents").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new contents");
    }

    #[test]
    fn test_atomic_write_into_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let err = atomic_write(&blocker.join("out.xlsx"), b"data").unwrap_err();
        assert!(matches!(err, StoreError::CreateDirectory { .. }));
    }
}
