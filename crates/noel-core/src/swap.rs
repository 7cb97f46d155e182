//! Job database swapping.
//!
//! Moves Ketarin's live job database out of the way before a package run and
//! puts it back afterwards. This module provides:
//! - Swap-out: copy the live database to a working copy and a timestamped backup
//! - Restore-in: replace the live database with the working copy
//! - Clear: delete the live database
//! - Listing the backups left behind by earlier swaps
//!
//! # File Layout
//!
//! ```text
//! %APPDATA%\Ketarin\
//! ├── jobs.db                                   # live database
//! ├── jobs.db_2024-03-09-070509.noel.bak        # one backup per swap-out
//! └── jobs.db_2024-03-10-081112.noel.bak
//! .\jobs.db                                     # working copy
//! ```
//!
//! Backups are write-once. They are never read back, overwritten or pruned.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::NoelError;
use crate::fsutil::write_atomic;
use crate::paths::PathResolver;

/// Swaps the live job database in and out.
///
/// Holds no state between calls: every operation re-resolves its paths and
/// reopens its files.
pub struct DatabaseSwap<C = SystemClock> {
    resolver: PathResolver,
    clock: C,
}

impl DatabaseSwap<SystemClock> {
    /// Create a swap engine timestamping backups with the system clock.
    pub fn new(resolver: PathResolver) -> Self {
        Self::with_clock(resolver, SystemClock)
    }
}

impl<C: Clock> DatabaseSwap<C> {
    pub fn with_clock(resolver: PathResolver, clock: C) -> Self {
        Self { resolver, clock }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Copy the live database to the working copy and to a new backup.
    ///
    /// The live file is read once into memory and both destinations are
    /// written from that buffer. The working copy is created or truncated;
    /// the backup must not already exist and is created first, so a taken
    /// backup name leaves the working copy untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The application data directory is unknown
    /// - The live database is missing or unreadable
    /// - Either destination cannot be created or written
    ///
    /// A failure writing the working copy leaves the new backup in place.
    pub fn swap_out(&self) -> Result<SwapOutcome, NoelError> {
        let live = self.resolver.live_database_path()?;
        let content = fs::read(&live).map_err(|e| NoelError::io(&live, e))?;

        let created_at = self.clock.now();
        let working = self.resolver.working_copy_path();
        let backup = self.resolver.backup_path(&created_at)?;

        info!(
            "Swapping out {:?} ({} bytes) to {:?}, backup {:?}",
            live,
            content.len(),
            working,
            backup
        );

        // The backup goes first: if its name is taken the working copy must
        // still hold the previous swap's content.
        write_new(&backup, &content)?;
        fs::write(&working, &content).map_err(|e| NoelError::io(&working, e))?;

        let outcome = SwapOutcome {
            live,
            working,
            backup,
            created_at,
            bytes: content.len() as u64,
            sha256: sha256_hex(&content),
        };
        debug!("Swap-out completed: {:?}", outcome);
        Ok(outcome)
    }

    /// Replace the live database with the working copy.
    ///
    /// The working copy is left in place. The live database's directory is
    /// not created; if it is missing the restore fails.
    pub fn restore_in(&self) -> Result<RestoreOutcome, NoelError> {
        let working = self.resolver.working_copy_path();
        let content = fs::read(&working).map_err(|e| NoelError::io(&working, e))?;
        let live = self.resolver.live_database_path()?;

        info!(
            "Restoring {:?} ({} bytes) over {:?}",
            working,
            content.len(),
            live
        );
        write_atomic(&live, &content)?;

        Ok(RestoreOutcome {
            live,
            working,
            bytes: content.len() as u64,
            sha256: sha256_hex(&content),
        })
    }

    /// Delete the live database. A missing database is an error.
    pub fn clear(&self) -> Result<PathBuf, NoelError> {
        let live = self.resolver.live_database_path()?;
        fs::remove_file(&live).map_err(|e| NoelError::io(&live, e))?;
        info!("Deleted live database {:?}", live);
        Ok(live)
    }

    /// List backups next to the live database, newest first.
    ///
    /// Only file names and metadata are inspected; backup content is never
    /// read. A missing database directory yields an empty list.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>, NoelError> {
        let dir = self.resolver.database_dir()?;
        let mut backups = Vec::new();

        if !dir.exists() {
            return Ok(backups);
        }

        let entries = fs::read_dir(&dir).map_err(|e| NoelError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| NoelError::io(&dir, e))?;
            let path = entry.path();

            let Some(created_at) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| self.resolver.parse_backup_file_name(name))
            else {
                continue;
            };

            match entry.metadata() {
                Ok(metadata) if metadata.is_file() => backups.push(BackupInfo {
                    path,
                    created_at,
                    size: metadata.len(),
                }),
                Ok(_) => debug!("Skipping non-file backup entry {:?}", path),
                Err(e) => warn!("Failed to read metadata for {:?}: {}", path, e),
            }
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }
}

/// Write `data` to a file that must not exist yet.
fn write_new(path: &Path, data: &[u8]) -> Result<(), NoelError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| NoelError::io(path, e))?;
    file.write_all(data).map_err(|e| NoelError::io(path, e))?;
    file.sync_all().map_err(|e| NoelError::io(path, e))
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Result of a successful swap-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Live database that was copied
    pub live: PathBuf,
    /// Working copy written
    pub working: PathBuf,
    /// Backup created
    pub backup: PathBuf,
    /// Timestamp embedded in the backup name
    pub created_at: NaiveDateTime,
    /// Size of the copied content
    pub bytes: u64,
    /// SHA-256 of the copied content
    pub sha256: String,
}

/// Result of a successful restore-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub live: PathBuf,
    pub working: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// A backup file found next to the live database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    /// Timestamp parsed from the file name
    pub created_at: NaiveDateTime,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::{DatabaseConfig, UpdaterConfig};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn stamp(s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, s)
            .unwrap()
    }

    /// Lay out `<temp>/appdata/Ketarin` and `<temp>/work`, returning a swap
    /// engine rooted there.
    fn create_test_swap(at: NaiveDateTime) -> (DatabaseSwap<FixedClock>, TempDir) {
        let temp = TempDir::new().unwrap();
        let app_data = temp.path().join("appdata");
        fs::create_dir_all(app_data.join("Ketarin")).unwrap();
        fs::create_dir_all(temp.path().join("work")).unwrap();

        let mut database = DatabaseConfig::default();
        database.working_dir = Some(temp.path().join("work"));
        let resolver = PathResolver::with_app_data(database, UpdaterConfig::default(), Some(app_data));
        (DatabaseSwap::with_clock(resolver, FixedClock(at)), temp)
    }

    fn live_path(swap: &DatabaseSwap<FixedClock>) -> PathBuf {
        swap.resolver().live_database_path().unwrap()
    }

    #[test]
    fn test_swap_out_copies_to_working_and_backup() {
        let (swap, _temp) = create_test_swap(stamp(9));
        fs::write(live_path(&swap), b"DBv1").unwrap();

        let outcome = swap.swap_out().unwrap();

        assert_eq!(fs::read(&outcome.working).unwrap(), b"DBv1");
        assert_eq!(fs::read(&outcome.backup).unwrap(), b"DBv1");
        assert_eq!(fs::read(live_path(&swap)).unwrap(), b"DBv1");
        assert_eq!(outcome.bytes, 4);
        assert_eq!(outcome.created_at, stamp(9));
        assert!(outcome
            .backup
            .ends_with("jobs.db_2024-03-09-070509.noel.bak"));
    }

    #[test]
    fn test_swap_out_large_content_reaches_both_destinations() {
        let (swap, _temp) = create_test_swap(stamp(1));
        let content: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        fs::write(live_path(&swap), &content).unwrap();

        let outcome = swap.swap_out().unwrap();

        assert_eq!(fs::read(&outcome.working).unwrap(), content);
        assert_eq!(fs::read(&outcome.backup).unwrap(), content);
        assert_eq!(outcome.bytes, content.len() as u64);
    }

    #[test]
    fn test_swap_out_missing_live_fails() {
        let (swap, _temp) = create_test_swap(stamp(1));
        let err = swap.swap_out().unwrap_err();
        assert!(err.is_not_found());
        assert!(!swap.resolver().working_copy_path().exists());
    }

    #[test]
    fn test_swap_out_never_overwrites_backup() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::write(live_path(&swap), b"DBv1").unwrap();
        let first = swap.swap_out().unwrap();

        fs::write(live_path(&swap), b"DBv2").unwrap();
        let err = swap.swap_out().unwrap_err();
        assert!(matches!(err, NoelError::Io { ref source, .. }
            if source.kind() == std::io::ErrorKind::AlreadyExists));

        assert_eq!(fs::read(&first.backup).unwrap(), b"DBv1");
        assert_eq!(fs::read(&first.working).unwrap(), b"DBv1");
    }

    #[test]
    fn test_swap_out_does_not_create_working_copy_when_backup_taken() {
        let (swap, _temp) = create_test_swap(stamp(2));
        fs::write(live_path(&swap), b"DBv1").unwrap();
        let backup = swap.resolver().backup_path(&stamp(2)).unwrap();
        fs::write(&backup, b"older").unwrap();

        assert!(swap.swap_out().is_err());
        assert!(!swap.resolver().working_copy_path().exists());
        assert_eq!(fs::read(&backup).unwrap(), b"older");
    }

    #[test]
    fn test_swap_out_hash() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::write(live_path(&swap), b"hello world").unwrap();

        let outcome = swap.swap_out().unwrap();
        assert_eq!(
            outcome.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_restore_in_overwrites_live() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::write(live_path(&swap), b"DBv2").unwrap();
        fs::write(swap.resolver().working_copy_path(), b"DBv1").unwrap();

        let outcome = swap.restore_in().unwrap();

        assert_eq!(fs::read(live_path(&swap)).unwrap(), b"DBv1");
        assert_eq!(fs::read(&outcome.working).unwrap(), b"DBv1");
        assert_eq!(outcome.bytes, 4);
    }

    #[test]
    fn test_restore_in_creates_absent_live() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::write(swap.resolver().working_copy_path(), b"DBv1").unwrap();

        swap.restore_in().unwrap();
        assert_eq!(fs::read(live_path(&swap)).unwrap(), b"DBv1");
    }

    #[test]
    fn test_restore_in_missing_working_fails() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::write(live_path(&swap), b"DBv2").unwrap();

        let err = swap.restore_in().unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fs::read(live_path(&swap)).unwrap(), b"DBv2");
    }

    #[test]
    fn test_restore_in_missing_live_dir_fails() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::write(swap.resolver().working_copy_path(), b"DBv1").unwrap();
        fs::remove_dir_all(swap.resolver().database_dir().unwrap()).unwrap();

        assert!(swap.restore_in().is_err());
        assert!(!swap.resolver().database_dir().unwrap().exists());
    }

    #[test]
    fn test_clear() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::write(live_path(&swap), b"DBv1").unwrap();

        let removed = swap.clear().unwrap();
        assert_eq!(removed, live_path(&swap));
        assert!(!removed.exists());

        // Second clear has nothing to delete.
        assert!(swap.clear().unwrap_err().is_not_found());
    }

    #[test]
    fn test_operations_without_app_data() {
        let resolver = PathResolver::with_app_data(
            DatabaseConfig::default(),
            UpdaterConfig::default(),
            None,
        );
        let swap = DatabaseSwap::with_clock(resolver, FixedClock(stamp(1)));

        assert!(matches!(swap.swap_out(), Err(NoelError::Environment { .. })));
        assert!(matches!(swap.clear(), Err(NoelError::Environment { .. })));
        assert!(matches!(swap.list_backups(), Err(NoelError::Environment { .. })));
    }

    #[test]
    fn test_list_backups_newest_first() {
        let (swap, _temp) = create_test_swap(stamp(1));
        let dir = swap.resolver().database_dir().unwrap();
        fs::write(live_path(&swap), b"DBv1").unwrap();

        swap.swap_out().unwrap();
        let later = DatabaseSwap::with_clock(swap.resolver().clone(), FixedClock(stamp(30)));
        later.swap_out().unwrap();

        // Unrelated files are ignored.
        fs::write(dir.join("jobs.db.old"), b"x").unwrap();
        fs::write(dir.join("jobs.db_garbage.noel.bak"), b"x").unwrap();

        let backups = swap.list_backups().unwrap();
        assert_eq!(backups.len(), 2);
        assert_eq!(backups[0].created_at, stamp(30));
        assert_eq!(backups[1].created_at, stamp(1));
        assert!(backups.iter().all(|b| b.size == 4));
    }

    #[test]
    fn test_list_backups_missing_dir() {
        let (swap, _temp) = create_test_swap(stamp(1));
        fs::remove_dir_all(swap.resolver().database_dir().unwrap()).unwrap();
        assert!(swap.list_backups().unwrap().is_empty());
    }
}
