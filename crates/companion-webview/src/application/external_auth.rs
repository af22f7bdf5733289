//! External-auth script channels (`getExternalAuth`, `revokeExternalAuth`).
//!
//! The frontend asks for a token by posting `{callback, force}`; the host
//! answers by evaluating `callback(true, {...})` or
//! `callback(false, 'Token unavailable')`.  Token work happens on a tokio task
//! and the callback script is posted to the session outbox, so every request
//! gets exactly one completion and the runtime is only touched from the
//! session context.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::dispatcher::Outbound;
use super::ports::TokenProvider;

/// Validates a callback name received from the page.
///
/// Only dotted identifiers are accepted (`window.externalAuthSetToken`), which
/// keeps arbitrary script out of the evaluated string.
pub fn is_valid_callback(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}

/// Answers the page's token requests.
pub struct ExternalAuthBridge {
    session_id: Uuid,
    tokens: Arc<dyn TokenProvider>,
    outbox: mpsc::UnboundedSender<Outbound>,
}

impl ExternalAuthBridge {
    pub fn new(session_id: Uuid, tokens: Arc<dyn TokenProvider>, outbox: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { session_id, tokens, outbox }
    }

    /// Handles `getExternalAuth`.  Returns `false` if the request was refused
    /// before any work started.
    pub fn get_external_auth(&self, callback: &str, force_refresh: bool) -> bool {
        if !is_valid_callback(callback) {
            warn!("session {}: refusing auth callback {:?}", self.session_id, callback);
            return false;
        }
        let tokens = Arc::clone(&self.tokens);
        let callback = callback.to_string();
        let session_id = self.session_id;
        self.spawn("getExternalAuth", async move {
            match tokens.access_token(force_refresh).await {
                Ok(token) => {
                    debug!("session {}: delivering access token (expires in {}s)", session_id, token.expires_in);
                    let body = json!({ "access_token": token.access_token, "expires_in": token.expires_in });
                    format!("{}(true, {});", callback, body)
                }
                Err(e) => {
                    warn!("session {}: token unavailable: {:#}", session_id, e);
                    format!("{}(false, 'Token unavailable');", callback)
                }
            }
        })
    }

    /// Handles `revokeExternalAuth`.
    pub fn revoke_external_auth(&self, callback: &str) -> bool {
        if !is_valid_callback(callback) {
            warn!("session {}: refusing auth callback {:?}", self.session_id, callback);
            return false;
        }
        let tokens = Arc::clone(&self.tokens);
        let callback = callback.to_string();
        let session_id = self.session_id;
        self.spawn("revokeExternalAuth", async move {
            match tokens.revoke().await {
                Ok(()) => format!("{}(true);", callback),
                Err(e) => {
                    warn!("session {}: revoke failed: {:#}", session_id, e);
                    format!("{}(false, 'Token unavailable');", callback)
                }
            }
        })
    }

    fn spawn<F>(&self, channel: &'static str, work: F) -> bool
    where
        F: std::future::Future<Output = String> + Send + 'static,
    {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("session {}: {} needs an async runtime", self.session_id, channel);
            return false;
        };
        let outbox = self.outbox.clone();
        let session_id = self.session_id;
        runtime.spawn(async move {
            let script = work.await;
            if outbox.send(Outbound::Script(script)).is_err() {
                debug!("session {}: outbox closed, dropping {} completion", session_id, channel);
            }
        });
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
