//! Backup file persistence
//!
//! Writes export payloads to dated files and reads them back for import.
//! Uses atomic writes (write to temp file, then rename) so an interrupted
//! export never leaves a truncated backup behind.
//!
//! File name: `recepten-backup-YYYY-MM-DD.json` in the backup directory
//! (configurable via `Config`). A second export on the same day replaces
//! the earlier file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::storage::error::{StoreError, StoreResult};

const BACKUP_PREFIX: &str = "recepten-backup-";
const BACKUP_EXTENSION: &str = "json";

/// File name for a backup taken on `date`
pub fn backup_file_name(date: NaiveDate) -> String {
    format!(
        "{}{}.{}",
        BACKUP_PREFIX,
        date.format("%Y-%m-%d"),
        BACKUP_EXTENSION
    )
}

/// Write `contents` as the backup for `taken_at` into `dir`
///
/// Returns the path of the written file.
pub fn write_backup(dir: &Path, contents: &str, taken_at: DateTime<Utc>) -> StoreResult<PathBuf> {
    let path = dir.join(backup_file_name(taken_at.date_naive()));
    atomic_write(&path, contents.as_bytes())?;
    Ok(path)
}

/// Read a backup file as UTF-8 text
pub fn read_backup(path: &Path) -> StoreResult<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            StoreError::from_io(e, path.to_path_buf())
        }
        _ => StoreError::ReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

/// List backup files in `dir`, newest name first
///
/// A missing directory yields an empty list.
pub fn list_backups(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::from_io(e, dir.to_path_buf())),
    };

    let mut backups = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| StoreError::from_io(e, dir.to_path_buf()))?
            .path();
        let is_backup = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                name.starts_with(BACKUP_PREFIX) && name.ends_with(BACKUP_EXTENSION)
            });
        if is_backup {
            backups.push(path);
        }
    }

    // Dates in the name sort lexicographically
    backups.sort();
    backups.reverse();
    Ok(backups)
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    file.sync_all()
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::from_io(e, path.to_path_buf()))?;

    Ok(())
}
