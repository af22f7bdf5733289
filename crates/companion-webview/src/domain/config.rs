//! Session configuration types.
//!
//! [`SessionConfig`] holds every runtime knob of a web-view session.  It is a
//! plain struct: the infrastructure layer fills it from the settings file or
//! CLI, tests build it directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Native features advertised to the frontend in the `config/get` reply.
///
/// Field names are serialized in camelCase because the frontend reads them
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostCapabilities {
    pub has_settings_screen: bool,
    pub can_write_tag: bool,
    pub can_commission_matter: bool,
    pub can_import_thread_credentials: bool,
    pub has_bar_code_scanner: bool,
    pub can_transfer_thread_credentials_to_keychain: bool,
    pub has_assist: bool,
    pub can_setup_improv: bool,
}

/// All runtime configuration for one web-view session.
///
/// # Example
///
/// ```rust
/// use companion_webview::domain::SessionConfig;
///
/// let cfg = SessionConfig::default();
/// assert_eq!(cfg.background_restart_threshold.as_secs(), 30);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the reconnect timer checks elapsed background time.
    pub reconnect_check_interval: Duration,

    /// Background time after which the frontend is told to restart its
    /// live-data connection.
    pub background_restart_threshold: Duration,

    /// Whether a previously restored deep link is reopened on first load.
    pub restore_last_url: bool,

    /// The hub's live-data transport is known to stall across background
    /// transitions, so the reconnect timer should run.
    pub restart_on_background_stall: bool,

    /// Reported by the built-in `config/get` handler.
    pub capabilities: HostCapabilities,

    /// Hub paths that are opened in the external browser instead of inline.
    pub external_open_paths: Vec<String>,
}

impl Default for SessionConfig {
    /// | Field                        | Default                                   |
    /// |------------------------------|-------------------------------------------|
    /// | reconnect_check_interval     | 5 seconds                                 |
    /// | background_restart_threshold | 30 seconds                                |
    /// | restore_last_url             | `true`                                    |
    /// | restart_on_background_stall  | `true`                                    |
    /// | capabilities                 | settings screen only                      |
    /// | external_open_paths          | `/api`, `/static`, `/hacsfiles`, `/local` |
    fn default() -> Self {
        Self {
            reconnect_check_interval: Duration::from_secs(5),
            background_restart_threshold: Duration::from_secs(30),
            restore_last_url: true,
            restart_on_background_stall: true,
            capabilities: HostCapabilities { has_settings_screen: true, ..Default::default() },
            external_open_paths: ["/api", "/static", "/hacsfiles", "/local"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reconnect_check_interval_is_5s() {
        // Arrange / Act
        let cfg = SessionConfig::default();
        // Assert
        assert_eq!(cfg.reconnect_check_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_default_threshold_is_30s() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.background_restart_threshold, Duration::from_secs(30));
    }

    #[test]
    fn test_default_external_paths() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.external_open_paths, vec!["/api", "/static", "/hacsfiles", "/local"]);
    }

    #[test]
    fn test_capabilities_serialize_in_camel_case() {
        // Arrange
        let caps = HostCapabilities { can_write_tag: true, has_assist: true, ..Default::default() };

        // Act
        let value = serde_json::to_value(&caps).expect("serialize");

        // Assert
        assert_eq!(value["canWriteTag"], true);
        assert_eq!(value["hasAssist"], true);
        assert_eq!(value["canTransferThreadCredentialsToKeychain"], false);
        assert_eq!(value.as_object().map(|o| o.len()), Some(8));
    }
}
