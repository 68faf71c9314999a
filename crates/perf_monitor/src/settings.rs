//! Persisted enable/disable flags.
//!
//! The monitor itself only holds its flags in memory. This module provides
//! the collaborator that carries them across sessions: a [`SettingsStore`]
//! plus the startup resolution order (stored override, then the
//! `PERF_MONITOR` environment variable, then the build mode).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::PerfResult;

/// Environment variable consulted when no stored override exists.
pub const ENV_VAR: &str = "PERF_MONITOR";

/// The flag pair persisted across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSettings {
    /// Whether measurements are recorded
    pub enabled: bool,
    /// Whether every completion is traced
    #[serde(default)]
    pub detailed_tracing: bool,
}

impl Default for MonitorSettings {
    /// Enabled in debug builds, disabled in release builds.
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
            detailed_tracing: false,
        }
    }
}

/// Storage for the persisted flags.
pub trait SettingsStore: Send + Sync {
    /// Load the stored override, `None` if nothing was ever saved.
    fn load(&self) -> PerfResult<Option<MonitorSettings>>;

    /// Persist the flags.
    fn save(&self, settings: &MonitorSettings) -> PerfResult<()>;
}

/// Settings persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSettings {
    path: PathBuf,
}

impl JsonFileSettings {
    /// Store settings at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store settings as `perf_monitor.json` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("perf_monitor.json"))
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileSettings {
    fn load(&self) -> PerfResult<Option<MonitorSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, settings: &MonitorSettings) -> PerfResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    stored: Mutex<Option<MonitorSettings>>,
}

impl MemorySettings {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn load(&self) -> PerfResult<Option<MonitorSettings>> {
        Ok(*self.stored.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn save(&self, settings: &MonitorSettings) -> PerfResult<()> {
        *self.stored.lock().unwrap_or_else(PoisonError::into_inner) = Some(*settings);
        Ok(())
    }
}

/// Parse an on/off flag value.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Resolve the startup flags from a store override and an environment value.
///
/// A store that fails to load is logged and treated as empty.
pub fn resolve_settings(store: &dyn SettingsStore, env_value: Option<&str>) -> MonitorSettings {
    match store.load() {
        Ok(Some(settings)) => return settings,
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(target: "perf::settings", error = %err, "failed to load monitor settings, using defaults");
        }
    }

    match env_value.map(|value| (value, parse_flag(value))) {
        Some((_, Some(enabled))) => MonitorSettings {
            enabled,
            ..MonitorSettings::default()
        },
        Some((value, None)) => {
            tracing::warn!(target: "perf::settings", value, "unrecognized {} value", ENV_VAR);
            MonitorSettings::default()
        }
        None => MonitorSettings::default(),
    }
}

/// Resolve the startup flags from a store and the process environment.
pub fn resolve_initial_settings(store: &dyn SettingsStore) -> MonitorSettings {
    let env_value = std::env::var(ENV_VAR).ok();
    resolve_settings(store, env_value.as_deref())
}

/// Persist flags, logging instead of failing.
pub fn persist_settings(store: &dyn SettingsStore, settings: &MonitorSettings) -> bool {
    match store.save(settings) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(target: "perf::settings", error = %err, "failed to persist monitor settings");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ON: MonitorSettings = MonitorSettings {
        enabled: true,
        detailed_tracing: true,
    };

    #[test]
    fn test_default_follows_build_mode() {
        assert_eq!(MonitorSettings::default().enabled, cfg!(debug_assertions));
        assert!(!MonitorSettings::default().detailed_tracing);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_json_file_load_save() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileSettings::in_dir(temp_dir.path().join("nested"));

        assert_eq!(store.load().unwrap(), None);

        store.save(&ON).unwrap();
        let reloaded = JsonFileSettings::new(store.path());
        assert_eq!(reloaded.load().unwrap(), Some(ON));
    }

    #[test]
    fn test_json_file_corrupt_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileSettings::in_dir(temp_dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(store.load().is_err());
    }

    #[test]
    fn test_stored_override_wins_over_env() {
        let store = MemorySettings::new();
        store.save(&ON).unwrap();

        assert_eq!(resolve_settings(&store, Some("0")), ON);
    }

    #[test]
    fn test_env_used_without_override() {
        let store = MemorySettings::new();

        assert!(resolve_settings(&store, Some("on")).enabled);
        assert!(!resolve_settings(&store, Some("off")).enabled);
        assert_eq!(resolve_settings(&store, Some("garbage")), MonitorSettings::default());
        assert_eq!(resolve_settings(&store, None), MonitorSettings::default());
    }

    #[test]
    fn test_corrupt_store_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileSettings::in_dir(temp_dir.path());
        std::fs::write(store.path(), "{not json").unwrap();

        assert!(resolve_settings(&store, Some("1")).enabled);
    }

    #[test]
    fn test_persist_settings_reports_failure() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should be makes the write fail.
        let store = JsonFileSettings::new(temp_dir.path());

        assert!(!persist_settings(&store, &ON));
        assert!(persist_settings(&MemorySettings::new(), &ON));
    }
}
