//! TOML persistence for the connection and session settings.
//!
//! ```toml
//! [connection]
//! internal_url = "http://192.168.1.10:8123"
//! external_url = "https://hub.example.com"
//! webhook_id = "abc123"
//! internal_ssids = ["HomeWiFi"]
//!
//! [session]
//! restore_last_url = true
//! reconnect_check_interval_secs = 5
//! background_restart_threshold_secs = 30
//! last_url = "https://hub.example.com/lovelace/0"
//!
//! [capabilities]
//! canWriteTag = true
//! ```
//!
//! Missing fields fall back to their defaults, so an empty or absent file is a
//! valid (if endpoint-less) configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use companion_core::ConnectionConfig;

use crate::domain::{HostCapabilities, SessionConfig};

/// Error type for settings file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The settings could not be serialized to TOML.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// Everything stored in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default = "default_capabilities")]
    pub capabilities: HostCapabilities,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// On-disk form of [`SessionConfig`] plus the restorable deep link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_true")]
    pub restore_last_url: bool,
    #[serde(default = "default_true")]
    pub restart_on_background_stall: bool,
    #[serde(default = "default_check_interval_secs")]
    pub reconnect_check_interval_secs: u64,
    #[serde(default = "default_restart_threshold_secs")]
    pub background_restart_threshold_secs: u64,
    /// Last page the user was on, saved when the session is torn down.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_url: Option<Url>,
}

fn default_capabilities() -> HostCapabilities {
    SessionConfig::default().capabilities
}
fn default_true() -> bool {
    true
}
fn default_check_interval_secs() -> u64 {
    5
}
fn default_restart_threshold_secs() -> u64 {
    30
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            capabilities: default_capabilities(),
            connection: ConnectionConfig::default(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            restore_last_url: default_true(),
            restart_on_background_stall: default_true(),
            reconnect_check_interval_secs: default_check_interval_secs(),
            background_restart_threshold_secs: default_restart_threshold_secs(),
            last_url: None,
        }
    }
}

impl SettingsFile {
    /// Runtime session configuration.  Fields not stored on disk keep their
    /// [`SessionConfig::default`] values.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_check_interval: Duration::from_secs(self.session.reconnect_check_interval_secs),
            background_restart_threshold: Duration::from_secs(self.session.background_restart_threshold_secs),
            restore_last_url: self.session.restore_last_url,
            restart_on_background_stall: self.session.restart_on_background_stall,
            capabilities: self.capabilities.clone(),
            ..SessionConfig::default()
        }
    }

    /// The deep link to restore, if restoring is enabled.
    pub fn restored_url(&self) -> Option<Url> {
        self.session.last_url.clone().filter(|_| self.session.restore_last_url)
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

/// Loads settings from `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_settings(path: &Path) -> Result<SettingsFile, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SettingsFile::default()),
        Err(e) => Err(ConfigError::Io { path: path.to_path_buf(), source: e }),
    }
}

/// Writes `settings` to `path`, creating the parent directory first.
pub fn save_settings(path: &Path, settings: &SettingsFile) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io { path: dir.to_path_buf(), source })?;
    }

    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
