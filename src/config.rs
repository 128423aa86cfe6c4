//! Persisted user settings.
//!
//! Stored as pretty-printed JSON under the platform config directory.
//! Every field carries a default so a settings file from an older
//! version, or a hand-edited partial file, still loads.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::base::{AddrFamily, Domain};
use crate::fetch::FetchMode;
use crate::probe::ProbeConfig;

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub probe: ProbeConfig,
    pub family: AddrFamily,
    pub fetch_mode: FetchMode,
    /// Extra domains resolved and probed alongside the fetched list.
    pub extra_domains: Vec<Domain>,
    pub resolve_concurrency: usize,
    /// Flush the OS resolver cache after each successful write.
    pub flush_after_write: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            family: AddrFamily::default(),
            fetch_mode: FetchMode::Automatic,
            extra_domains: Vec::new(),
            resolve_concurrency: crate::dns::DEFAULT_RESOLVE_CONCURRENCY,
            flush_after_write: true,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields defaults; a
    /// corrupt file is logged and replaced by defaults rather than
    /// aborting startup.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings unreadable, using defaults");
                return Self::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings corrupt, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, text)
    }
}

/// Per-user config directory for this tool.
pub fn config_dir() -> PathBuf {
    app_data_root().join("smarthosts")
}

pub fn settings_path() -> PathBuf {
    config_dir().join(SETTINGS_FILE)
}

/// Default location for hosts-file backups.
pub fn backup_dir() -> PathBuf {
    config_dir().join("backups")
}

#[cfg(windows)]
fn app_data_root() -> PathBuf {
    std::env::var_os("LOCALAPPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Users\Default\AppData\Local"))
}

#[cfg(not(windows))]
fn app_data_root() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config"))
        .unwrap_or_else(|| PathBuf::from("/etc"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json"));
        assert_eq!(settings.probe.port, 443);
        assert!(settings.flush_after_write);
    }

    #[test]
    fn corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{not json").unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.resolve_concurrency, 20);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut settings = Settings::default();
        settings.probe.port = 80;
        settings.family = AddrFamily::V4Only;
        settings.fetch_mode = FetchMode::Pinned("hellogithub".to_string());
        settings
            .extra_domains
            .push(Domain::parse("example.com").unwrap());
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path);
        assert_eq!(loaded.probe.port, 80);
        assert_eq!(loaded.family, AddrFamily::V4Only);
        assert_eq!(
            loaded.fetch_mode,
            FetchMode::Pinned("hellogithub".to_string())
        );
        assert_eq!(loaded.extra_domains.len(), 1);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"resolve_concurrency": 5}"#).unwrap();
        let settings = Settings::load(&path);
        assert_eq!(settings.resolve_concurrency, 5);
        assert_eq!(settings.probe.trials, 3);
    }
}
