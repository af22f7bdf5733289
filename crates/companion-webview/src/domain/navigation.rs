//! Values exchanged between the session controller and the content runtime.

use serde_json::Value;
use url::Url;

use super::session_state::SessionError;

/// HTTP response the content runtime is about to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationResponse {
    pub url: Url,
    pub status: u16,
    pub is_main_frame: bool,
}

/// Decision returned for a [`NavigationResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationPolicy {
    Allow,
    Cancel,
}

/// Why a load did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The runtime cancelled the load itself (a newer load replaced it).
    /// Benign; never shown to the user.
    Cancelled,
    /// Anything else: DNS, TLS, timeout, connection reset...
    Other(String),
}

/// A failed provisional or committed load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadFailure {
    pub url: Option<Url>,
    pub reason: FailureReason,
}

impl LoadFailure {
    pub fn cancelled(url: Option<Url>) -> Self {
        Self { url, reason: FailureReason::Cancelled }
    }

    pub fn other(url: Option<Url>, reason: impl Into<String>) -> Self {
        Self { url, reason: FailureReason::Other(reason.into()) }
    }

    pub fn is_cancellation(&self) -> bool {
        self.reason == FailureReason::Cancelled
    }
}

/// Kind of authentication challenge raised by the content runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeMethod {
    ServerTrust,
    ClientCertificate,
    HttpBasic,
    Other(String),
}

/// A TLS server-trust or client-certificate challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub host: String,
    pub port: u16,
    pub method: ChallengeMethod,
}

/// Platform disposition for a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeDisposition {
    UseCredential,
    PerformDefaultHandling,
    CancelChallenge,
    RejectProtectionSpace,
}

impl ChallengeDisposition {
    pub fn is_rejection(self) -> bool {
        matches!(self, ChallengeDisposition::CancelChallenge | ChallengeDisposition::RejectProtectionSpace)
    }
}

/// Opaque credential handed back to the runtime.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Trust the presented server certificate chain.
    ServerTrust,
    /// Present the client identity with this keychain label.
    ClientIdentity { label: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ServerTrust => f.write_str("ServerTrust"),
            Credential::ClientIdentity { .. } => f.write_str("ClientIdentity(<redacted>)"),
        }
    }
}

/// What the trust evaluator decided.  Passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResponse {
    pub disposition: ChallengeDisposition,
    pub credential: Option<Credential>,
}

impl ChallengeResponse {
    pub fn default_handling() -> Self {
        Self { disposition: ChallengeDisposition::PerformDefaultHandling, credential: None }
    }
}

/// A message posted by the page on one of the injected script channels.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptMessage {
    /// `externalBus` channel: a raw bridge message.
    ExternalBus(Value),
    /// `getExternalAuth`: the page wants an access token delivered to
    /// `callback`.
    GetExternalAuth { callback: String, force: bool },
    /// `revokeExternalAuth`: the page logged out.
    RevokeExternalAuth { callback: String },
}

/// Where a link tapped inside the page should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    InApp,
    External,
}

/// Everything the session reports to the surrounding UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// A user-visible error: a transport banner or the no-endpoint screen.
    Error(SessionError),
    /// A usable endpoint exists again; hide the recovery affordance.
    EndpointAvailable,
    /// The restore-to-this-URL preference was dropped after a stale load.
    RestoredUrlCleared,
    /// Transient alert, e.g. the outcome of a URL-scheme command.
    Alert { title: String, message: String },
    /// Open in the system browser.
    OpenExternally(Url),
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_failure_is_cancellation() {
        assert!(LoadFailure::cancelled(None).is_cancellation());
        assert!(!LoadFailure::other(None, "timeout").is_cancellation());
    }

    #[test]
    fn test_rejection_dispositions() {
        assert!(ChallengeDisposition::CancelChallenge.is_rejection());
        assert!(ChallengeDisposition::RejectProtectionSpace.is_rejection());
        assert!(!ChallengeDisposition::UseCredential.is_rejection());
        assert!(!ChallengeDisposition::PerformDefaultHandling.is_rejection());
    }

    #[test]
    fn test_client_identity_debug_is_redacted() {
        let cred = Credential::ClientIdentity { label: "my-device-cert".into() };
        assert!(!format!("{:?}", cred).contains("my-device-cert"));
    }
}
