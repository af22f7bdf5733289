//! Session states and the error taxonomy of the bridge.

use std::fmt;

use companion_core::MalformedBridgeMessage;
use thiserror::Error;
use url::Url;

/// Navigation state of one web-view session.
///
/// ```text
/// idle ──appear──▶ loading ──finished──▶ loaded
///                    │  ▲                  │
///        stale 4xx/5xx  └──network change──┘
///                    ▼
///               recovering ──finished──▶ loaded
///
/// * ──no usable URL──▶ no_endpoint        * ──teardown──▶ closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Loaded,
    Recovering,
    NoEndpoint,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Idle => "idle",
            SessionState::Loading => "loading",
            SessionState::Loaded => "loaded",
            SessionState::Recovering => "recovering",
            SessionState::NoEndpoint => "no_endpoint",
            SessionState::Closed => "closed",
        })
    }
}

/// Every failure the session layer knows about.
///
/// None of these cross the session boundary as a panic.  Only
/// [`SessionError::TransportFailure`] and [`SessionError::NoEndpointAvailable`]
/// are shown to the user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Configuration produced no usable URL even after fallback.
    #[error("no endpoint available")]
    NoEndpointAvailable,

    /// An inbound bridge message had a missing or invalid envelope.
    #[error("malformed bridge message: {0}")]
    MalformedBridgeMessage(#[from] MalformedBridgeMessage),

    /// A handler returned an error or panicked.
    #[error("handler for {kind} failed: {message}")]
    HandlerFailure { kind: String, message: String },

    /// The restored deep link answered with an HTTP error.
    #[error("restored page {url} failed with HTTP {status}")]
    StaleRestoredPage { url: Url, status: u16 },

    /// An ordinary load failure.
    #[error("loading {} failed: {reason}", .url.as_ref().map(Url::as_str).unwrap_or("<unknown>"))]
    TransportFailure { url: Option<Url>, reason: String },

    /// The trust evaluator declined a TLS or client-certificate challenge.
    #[error("certificate rejected for {host}")]
    CertificateRejected { host: String },
}

impl SessionError {
    /// Whether the error is surfaced to the user.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, SessionError::NoEndpointAvailable | SessionError::TransportFailure { .. })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_and_no_endpoint_are_user_visible() {
        assert!(SessionError::NoEndpointAvailable.is_user_visible());
        assert!(SessionError::TransportFailure { url: None, reason: "offline".into() }.is_user_visible());
        assert!(!SessionError::MalformedBridgeMessage(MalformedBridgeMessage::MissingType).is_user_visible());
        assert!(!SessionError::CertificateRejected { host: "hub".into() }.is_user_visible());
    }

    #[test]
    fn test_transport_failure_message_without_url() {
        let err = SessionError::TransportFailure { url: None, reason: "timed out".into() };
        assert_eq!(err.to_string(), "loading <unknown> failed: timed out");
    }

    #[test]
    fn test_stale_restored_page_message_names_status() {
        let err = SessionError::StaleRestoredPage {
            url: Url::parse("http://hub:8123/old").expect("url"),
            status: 404,
        };
        assert_eq!(err.to_string(), "restored page http://hub:8123/old failed with HTTP 404");
    }

    #[test]
    fn test_state_display_names() {
        assert_eq!(SessionState::NoEndpoint.to_string(), "no_endpoint");
        assert_eq!(SessionState::Recovering.to_string(), "recovering");
    }
}
