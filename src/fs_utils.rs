//! Filesystem utility functions
//!
//! Advisory locks, atomic writes and timestamped backups used by the snippet store.

use anyhow::{Context, Result};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Number of backups kept per prefix
const MAX_BACKUPS: usize = 10;

/// Exclusive advisory lock on a file's sidecar `<file>.lock`, released on drop.
///
/// The lock lives beside the file so the rename in [`replace_file`] never swaps
/// out the locked inode.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Block until the lock for `path` is held.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let lock_path = sidecar(path, "lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {:?}", lock_path))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock: {:?}", lock_path))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Ignore errors, the handle is closed right after anyway
        let _ = self.file.unlock();
    }
}

/// Replace `path` with `content`; the caller must already hold its [`FileLock`].
///
/// Content goes to `<file>.tmp`, is synced, then renamed over the target: a
/// crash mid-write leaves the previous file intact.
pub fn replace_file(path: &Path, content: &str) -> Result<()> {
    let temp_path = sidecar(path, "tmp");
    {
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync temp file: {:?}", temp_path))?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} -> {:?}", temp_path, path))
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}", suffix));
    path.with_file_name(name)
}

/// Copy `path` into `backups_dir` as `<prefix>.<timestamp>.bak`, returning the backup path.
pub fn backup_file(path: &Path, backups_dir: &Path, prefix: &str) -> Result<PathBuf> {
    fs::create_dir_all(backups_dir)
        .with_context(|| format!("Failed to create backups directory: {:?}", backups_dir))?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = backups_dir.join(format!("{}.{}.bak", prefix, timestamp));

    fs::copy(path, &backup_path)
        .with_context(|| format!("Failed to back up {:?} -> {:?}", path, backup_path))?;

    cleanup_old_backups(backups_dir, prefix)?;
    Ok(backup_path)
}

fn cleanup_old_backups(backups_dir: &Path, prefix: &str) -> Result<()> {
    let marker = format!("{}.", prefix);
    let mut backups: Vec<_> = fs::read_dir(backups_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(&marker) && n.ends_with(".bak"))
        })
        .collect();

    if backups.len() <= MAX_BACKUPS {
        return Ok(());
    }

    // Timestamps sort lexicographically, oldest first
    backups.sort_by_key(|e| e.file_name());
    let excess = backups.len() - MAX_BACKUPS;
    for entry in backups.into_iter().take(excess) {
        fs::remove_file(entry.path())
            .with_context(|| format!("Failed to remove old backup: {:?}", entry.path()))?;
    }
    Ok(())
}

/// Modification time of `path`, or `None` if it cannot be read.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
