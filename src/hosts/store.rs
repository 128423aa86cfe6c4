//! Hosts-file store: atomic region rewrite, timestamped backups,
//! restore and resolver-cache flush.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use super::region::{self, RegionDefect};
use crate::base::{FlushError, Selection, StoreError};

const BACKUP_STAMP: &[FormatItem<'_>] =
    format_description!("[year][month][day]_[hour][minute][second]");
const UPDATED_STAMP: &[FormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// Serializes writers within this process. Cross-process callers race on
// the final rename, which is atomic, so the file is never torn.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// The hosts file as last read: full text plus the entries currently in
/// the managed region.
#[derive(Debug, Clone)]
pub struct HostsSnapshot {
    pub text: String,
    pub entries: Selection,
}

/// Reads and rewrites the managed region of a hosts file.
///
/// Every write follows the same discipline: back up the current file,
/// render the full new content, write it to a sibling temp file, then
/// rename over the original. A failure at any step leaves the target
/// untouched.
pub struct HostsFileStore {
    hosts_path: PathBuf,
    backup_dir: PathBuf,
}

impl HostsFileStore {
    pub fn new(hosts_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            hosts_path: hosts_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Store over the platform's system hosts file.
    pub fn system(backup_dir: impl Into<PathBuf>) -> Self {
        Self::new(system_hosts_path(), backup_dir)
    }

    pub fn hosts_path(&self) -> &Path {
        &self.hosts_path
    }

    pub fn read(&self) -> Result<HostsSnapshot, StoreError> {
        let text = fs::read_to_string(&self.hosts_path)
            .map_err(|e| StoreError::from_io(e, &self.hosts_path))?;
        let lines: Vec<&str> = text.lines().collect();
        let entries = match region::locate(&lines).map_err(|d| self.defect(d))? {
            Some(r) => region::parse_entries(&lines[r.start + 1..r.end]),
            None => Selection::new(),
        };
        Ok(HostsSnapshot { text, entries })
    }

    /// Replaces the managed region with `selection`. Returns the path of
    /// the backup taken before the write.
    pub fn write(&self, selection: &Selection) -> Result<PathBuf, StoreError> {
        let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let text = fs::read_to_string(&self.hosts_path)
            .map_err(|e| StoreError::from_io(e, &self.hosts_path))?;

        let updated_at = OffsetDateTime::now_utc()
            .format(UPDATED_STAMP)
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        let block = region::build_block(selection, &updated_at);
        let new_text = region::replace(&text, &block).map_err(|d| self.defect(d))?;

        let backup = self.take_backup(&text)?;
        if let Err(err) = self.replace_contents(&new_text) {
            tracing::error!(error = %err, "hosts write failed; target left untouched");
            return Err(err);
        }

        tracing::info!(
            path = %self.hosts_path.display(),
            entries = selection.len(),
            backup = %backup.display(),
            "hosts file updated"
        );
        Ok(backup)
    }

    /// Backups in the backup directory, newest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::from_io(e, &self.backup_dir)),
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| is_backup_name(p))
            .collect();
        // Stamped names sort chronologically.
        backups.sort();
        backups.reverse();
        Ok(backups)
    }

    pub fn latest_backup(&self) -> Result<Option<PathBuf>, StoreError> {
        Ok(self.list_backups()?.into_iter().next())
    }

    /// Restores the hosts file from `backup`, with the same atomic
    /// discipline as a write.
    pub fn restore(&self, backup: &Path) -> Result<(), StoreError> {
        let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let text = match fs::read_to_string(backup) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::BackupNotFound {
                    path: backup.display().to_string(),
                })
            }
            Err(e) => return Err(StoreError::from_io(e, backup)),
        };
        self.replace_contents(&text)?;
        tracing::info!(backup = %backup.display(), "hosts file restored");
        Ok(())
    }

    fn take_backup(&self, text: &str) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| StoreError::from_io(e, &self.backup_dir))?;

        let stamp = OffsetDateTime::now_utc()
            .format(BACKUP_STAMP)
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        let mut path = self.backup_dir.join(format!("hosts_{stamp}.bak"));
        let mut serial = 1;
        while path.exists() {
            path = self.backup_dir.join(format!("hosts_{stamp}-{serial}.bak"));
            serial += 1;
        }
        fs::write(&path, text).map_err(|e| StoreError::from_io(e, &path))?;
        Ok(path)
    }

    /// Writes `text` to a sibling temp file and renames it over the
    /// target. The temp file is removed on any failure.
    fn replace_contents(&self, text: &str) -> Result<(), StoreError> {
        let dir = self.hosts_path.parent().unwrap_or(Path::new("."));
        let tmp = dir.join(format!(".smarthosts-{}.tmp", std::process::id()));

        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.hosts_path)
        })();

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::from_io(err, &self.hosts_path));
        }
        Ok(())
    }

    fn defect(&self, defect: RegionDefect) -> StoreError {
        let path = self.hosts_path.display().to_string();
        match defect {
            RegionDefect::Duplicate => StoreError::DuplicateRegion { path },
            RegionDefect::Damaged => StoreError::MarkerDamaged { path },
        }
    }
}

fn is_backup_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("hosts_") && n.ends_with(".bak"))
        .unwrap_or(false)
}

#[cfg(windows)]
fn system_hosts_path() -> PathBuf {
    let root = std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".to_string());
    Path::new(&root).join(r"System32\drivers\etc\hosts")
}

#[cfg(not(windows))]
fn system_hosts_path() -> PathBuf {
    PathBuf::from("/etc/hosts")
}

/// Flushes the OS resolver cache so rewritten entries take effect
/// immediately. Failure here does not invalidate the write; the file on
/// disk is already correct.
pub fn flush_resolver_cache() -> Result<(), FlushError> {
    let (program, args): (&str, &[&str]) = if cfg!(windows) {
        ("ipconfig", &["/flushdns"])
    } else if cfg!(target_os = "macos") {
        ("dscacheutil", &["-flushcache"])
    } else {
        ("resolvectl", &["flush-caches"])
    };

    let status = std::process::Command::new(program)
        .args(args)
        .status()
        .map_err(FlushError::Spawn)?;
    if status.success() {
        tracing::debug!(program, "resolver cache flushed");
        Ok(())
    } else {
        Err(FlushError::CommandFailed(status.code().unwrap_or(-1)))
    }
}
