//! Collaborator ports.
//!
//! Everything the session needs from the outside world is injected through
//! one of these traits.  Production code implements them on top of the
//! platform web view, keychain and hardware APIs; tests use the recording
//! doubles in `infrastructure::mock` or `mockall` mocks.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::domain::{AuthChallenge, ChallengeResponse, SessionNotice};

/// Error returned by [`ContentRuntime::evaluate_script`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("script evaluation failed: {0}")]
pub struct ScriptError(pub String);

/// The embedded engine rendering the remote web application.
///
/// Must only be touched from the session context.
pub trait ContentRuntime: Send + Sync {
    fn load(&self, url: &Url);
    fn reload(&self);
    fn evaluate_script(&self, script: &str) -> Result<(), ScriptError>;
    /// URL currently committed in the main frame.
    fn current_url(&self) -> Option<Url>;
}

/// TLS server-trust / client-certificate decisions.
#[cfg_attr(test, mockall::automock)]
pub trait TrustEvaluator: Send + Sync {
    fn evaluate(&self, challenge: &AuthChallenge) -> ChallengeResponse;
}

/// Access token handed to the frontend.
#[derive(Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Seconds until expiry.
    pub expires_in: u64,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Source of hub credentials.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Whether a token exists without fetching it.
    fn has_token(&self) -> bool;
    /// Returns a valid token, refreshing first when `force_refresh` is set or
    /// the cached one expired.
    async fn access_token(&self, force_refresh: bool) -> anyhow::Result<AccessToken>;
    async fn revoke(&self) -> anyhow::Result<()>;
}

/// Surrounding UI: banners, recovery screen, alerts.
#[cfg_attr(test, mockall::automock)]
pub trait SessionUi: Send + Sync {
    fn notify(&self, notice: SessionNotice);
}

/// Feedback styles understood by the `haptic` handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticKind {
    Success,
    Error,
    Warning,
    Light,
    Medium,
    Heavy,
    Selection,
}

impl HapticKind {
    /// `failure` is accepted as an alias of `error`.
    pub fn from_wire(name: &str) -> Option<Self> {
        Some(match name {
            "success" => HapticKind::Success,
            "error" | "failure" => HapticKind::Error,
            "warning" => HapticKind::Warning,
            "light" => HapticKind::Light,
            "medium" => HapticKind::Medium,
            "heavy" => HapticKind::Heavy,
            "selection" => HapticKind::Selection,
            _ => return None,
        })
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait HapticFeedback: Send + Sync {
    fn play(&self, kind: HapticKind);
}

/// Frontend-reported state of its live-data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    AuthInvalid,
}

impl ConnectionEvent {
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "connected" => Some(ConnectionEvent::Connected),
            "disconnected" => Some(ConnectionEvent::Disconnected),
            "auth-invalid" => Some(ConnectionEvent::AuthInvalid),
            _ => None,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ConnectionStatusSink: Send + Sync {
    fn connection_status_changed(&self, event: ConnectionEvent);
}

/// Physical tag (NFC) reader / writer.
#[async_trait]
pub trait TagReader: Send + Sync {
    async fn read_tag(&self) -> anyhow::Result<String>;
    async fn write_tag(&self, tag: &str, name: Option<&str>) -> anyhow::Result<()>;
}

/// Outbound calls made by URL-scheme commands.
///
/// Each method is exactly one request against the active endpoint.
#[async_trait]
pub trait HubApi: Send + Sync {
    async fn call_service(
        &self,
        api_url: &Url,
        domain: &str,
        service: &str,
        data: &Map<String, Value>,
    ) -> anyhow::Result<()>;

    async fn fire_event(&self, api_url: &Url, event: &str, data: &Map<String, Value>) -> anyhow::Result<()>;

    async fn send_location(&self, webhook_url: &Url) -> anyhow::Result<()>;

    async fn render_template(
        &self,
        api_url: &Url,
        template: &str,
        variables: &Map<String, Value>,
    ) -> anyhow::Result<String>;

    async fn complete_auth(&self, api_url: &Url, code: &str, state: Option<&str>) -> anyhow::Result<()>;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
