//! Endpoint model: the network paths that lead to the same logical hub.
//!
//! A hub is reachable through up to four [`EndpointKind`]s.  Each kind may or
//! may not have a configured base URL.  [`ConnectionConfig`] collects them
//! together with the signals that decide when the internal path is usable.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// One of the named network paths to the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Direct LAN address, only usable on an allow-listed network.
    Internal,
    /// Public internet address.
    External,
    /// Remote UI relay address (only auto-selected when cloud relay is on).
    RemoteRelay,
    /// Cloud relay webhook address.  Never a base URL, not even when it is
    /// the override.
    CloudRelay,
}

impl EndpointKind {
    /// All kinds in declaration order.
    pub const ALL: [EndpointKind; 4] = [
        EndpointKind::Internal,
        EndpointKind::External,
        EndpointKind::RemoteRelay,
        EndpointKind::CloudRelay,
    ];

    /// Kinds whose URL is a base the content runtime can load.
    pub const BASES: [EndpointKind; 3] = [EndpointKind::Internal, EndpointKind::External, EndpointKind::RemoteRelay];

    pub fn is_base(self) -> bool {
        self != EndpointKind::CloudRelay
    }

    /// Wire / log name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointKind::Internal => "internal",
            EndpointKind::External => "external",
            EndpointKind::RemoteRelay => "remote_relay",
            EndpointKind::CloudRelay => "cloud_relay",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind that won resolution.
///
/// `Fallback` means no configured endpoint applied and the well-known local
/// hostname was used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActiveKind {
    Endpoint(EndpointKind),
    Fallback,
}

impl ActiveKind {
    /// Returns `true` when the active path is the internal (LAN) endpoint.
    pub fn is_internal(self) -> bool {
        self == ActiveKind::Endpoint(EndpointKind::Internal)
    }
}

impl Serialize for ActiveKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for ActiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveKind::Endpoint(kind) => kind.fmt(f),
            ActiveKind::Fallback => f.write_str("fallback"),
        }
    }
}

/// Configured endpoints and the signals that choose between them.
///
/// Owned by the settings collaborator.  The resolver only ever reads it; all
/// mutation inside a session is routed through the session controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// LAN base URL, e.g. `http://192.168.1.10:8123`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_url: Option<Url>,
    /// Public base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_url: Option<Url>,
    /// Remote UI relay base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_relay_url: Option<Url>,
    /// Cloud relay webhook URL (a complete webhook URL, not a base).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_relay_webhook_url: Option<Url>,
    /// Identifier appended to `api/webhook/` for direct webhook delivery.
    pub webhook_id: String,
    /// Wi-Fi SSIDs that count as the home network.
    pub internal_ssids: Vec<String>,
    /// Network hardware addresses that count as the home network.
    pub internal_hardware_addresses: Vec<String>,
    /// Allows the remote relay to be auto-selected.
    pub use_cloud_relay: bool,
    /// User or diagnostic forced choice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_kind: Option<EndpointKind>,
}

impl ConnectionConfig {
    /// Returns the configured URL for `kind`, if any.
    pub fn address(&self, kind: EndpointKind) -> Option<&Url> {
        match kind {
            EndpointKind::Internal => self.internal_url.as_ref(),
            EndpointKind::External => self.external_url.as_ref(),
            EndpointKind::RemoteRelay => self.remote_relay_url.as_ref(),
            EndpointKind::CloudRelay => self.cloud_relay_webhook_url.as_ref(),
        }
    }

    /// Replaces (or clears) the configured URL for `kind`.
    ///
    /// A trailing `/` on the path is removed so later path appends stay
    /// predictable.
    pub fn set_address(&mut self, kind: EndpointKind, url: Option<Url>) {
        let url = url.map(sanitize);
        match kind {
            EndpointKind::Internal => self.internal_url = url,
            EndpointKind::External => self.external_url = url,
            EndpointKind::RemoteRelay => self.remote_relay_url = url,
            EndpointKind::CloudRelay => self.cloud_relay_webhook_url = url,
        }
    }

    /// The remote relay may be auto-selected: it is enabled and its URL is
    /// known.
    pub fn can_use_cloud(&self) -> bool {
        self.use_cloud_relay && self.remote_relay_url.is_some()
    }

    /// `true` when nothing has been configured at all (never onboarded).
    pub fn is_empty(&self) -> bool {
        self.webhook_id.is_empty() && EndpointKind::ALL.iter().all(|k| self.address(*k).is_none())
    }
}

/// Removes trailing slashes from a non-root path.
///
/// `http://hub.local:8123/` stays as is (a URL always has at least `/`), but
/// `https://example.com/hub/` becomes `https://example.com/hub`.
pub fn sanitize(mut url: Url) -> Url {
    if url.path().len() > 1 && url.path().ends_with('/') {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }
    url
}

/// Result of one resolution call.
///
/// Never cached: the network signal can change between any two calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConnection {
    pub active_kind: ActiveKind,
    pub active_url: Url,
    pub webhook_url: Url,
    pub api_url: Url,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("test URL must parse")
    }

    #[test]
    fn test_default_config_is_empty() {
        // Arrange / Act
        let cfg = ConnectionConfig::default();

        // Assert
        assert!(cfg.is_empty());
        assert!(!cfg.can_use_cloud());
    }

    #[test]
    fn test_config_with_webhook_id_only_is_not_empty() {
        let cfg = ConnectionConfig { webhook_id: "abc".into(), ..Default::default() };
        assert!(!cfg.is_empty());
    }

    #[test]
    fn test_set_address_strips_trailing_slash() {
        // Arrange
        let mut cfg = ConnectionConfig::default();

        // Act
        cfg.set_address(EndpointKind::External, Some(url("https://example.com/hub/")));

        // Assert
        assert_eq!(cfg.address(EndpointKind::External), Some(&url("https://example.com/hub")));
        assert!(!cfg.is_empty());
    }

    #[test]
    fn test_set_address_none_clears_kind() {
        let mut cfg = ConnectionConfig::default();
        cfg.set_address(EndpointKind::Internal, Some(url("http://10.0.0.2:8123")));
        cfg.set_address(EndpointKind::Internal, None);
        assert!(cfg.address(EndpointKind::Internal).is_none());
    }

    #[test]
    fn test_sanitize_keeps_root_path() {
        assert_eq!(sanitize(url("http://hub.local:8123/")).as_str(), "http://hub.local:8123/");
    }

    #[test]
    fn test_sanitize_strips_repeated_slashes() {
        assert_eq!(sanitize(url("https://example.com/a//")).as_str(), "https://example.com/a");
    }

    #[test]
    fn test_can_use_cloud_needs_flag_and_remote_relay_url() {
        // Arrange
        let mut cfg = ConnectionConfig::default();
        cfg.set_address(EndpointKind::RemoteRelay, Some(url("https://relay.example.com")));

        // Act
        let without_flag = cfg.can_use_cloud();
        cfg.use_cloud_relay = true;

        // Assert
        assert!(!without_flag);
        assert!(cfg.can_use_cloud());
    }

    #[test]
    fn test_cloud_relay_is_the_only_non_base_kind() {
        let non_bases: Vec<_> = EndpointKind::ALL.into_iter().filter(|k| !k.is_base()).collect();
        assert_eq!(non_bases, vec![EndpointKind::CloudRelay]);
        assert!(EndpointKind::BASES.iter().all(|k| k.is_base()));
    }

    #[test]
    fn test_active_kind_display_names() {
        assert_eq!(ActiveKind::Endpoint(EndpointKind::RemoteRelay).to_string(), "remote_relay");
        assert_eq!(ActiveKind::Fallback.to_string(), "fallback");
        assert!(ActiveKind::Endpoint(EndpointKind::Internal).is_internal());
        assert!(!ActiveKind::Fallback.is_internal());
    }

    #[test]
    fn test_config_deserializes_from_json_with_defaults() {
        // Arrange
        let json = r#"{"external_url":"https://example.com","override_kind":"remote_relay"}"#;

        // Act
        let cfg: ConnectionConfig = serde_json::from_str(json).expect("deserialize");

        // Assert
        assert_eq!(cfg.external_url, Some(url("https://example.com")));
        assert_eq!(cfg.override_kind, Some(EndpointKind::RemoteRelay));
        assert!(cfg.internal_ssids.is_empty());
        assert!(!cfg.use_cloud_relay);
    }
}
