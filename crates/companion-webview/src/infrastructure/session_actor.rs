//! Session actor: drives one [`SessionController`] from a tokio task.
//!
//! Platform callbacks (navigation responses, script messages, lifecycle
//! transitions) arrive on any thread.  The actor serialises them onto a single
//! task together with the controller's outbox, so the controller and the
//! content runtime only ever run on that task.
//!
//! ```text
//! platform callbacks ──▶ SessionHandle ──▶ events ─┐
//!                                                  ├─ select! ─▶ SessionController
//! async handlers / timers ──▶ outbox ──────────────┘
//! ```
//!
//! The loop ends on [`SessionEvent::Teardown`] or when every handle is dropped.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use companion_core::{ConnectionConfig, EndpointKind};

use crate::application::dispatcher::Outbound;
use crate::application::session::SessionController;
use crate::domain::{
    AuthChallenge, ChallengeResponse, LoadFailure, NavigationPolicy, NavigationResponse, ScriptMessage, SessionState,
};

/// Everything the platform can tell a running session.
#[derive(Debug)]
pub enum SessionEvent {
    Appear,
    NetworkChanged,
    ConfigUpdated(ConnectionConfig),
    OverrideChanged(Option<EndpointKind>),
    NavigationResponse(NavigationResponse, oneshot::Sender<NavigationPolicy>),
    LoadFinished,
    LoadFailed(LoadFailure),
    Challenge(AuthChallenge, oneshot::Sender<ChallengeResponse>),
    Script(ScriptMessage),
    Refresh,
    Navigate(String),
    AdaptRequest(Url, oneshot::Sender<Url>),
    EnteredBackground,
    EnteredForeground,
    CurrentUrl(oneshot::Sender<Option<Url>>),
    Teardown,
}

/// What the session looked like when its loop ended.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub state: SessionState,
    /// Page displayed just before teardown, for the next run to restore.
    pub last_url: Option<Url>,
}

/// Cloneable sender side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Uuid,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// Spawns the actor loop for `controller`.
///
/// `outbox` is the receiver returned by [`SessionController::new`].
pub fn spawn_session(
    controller: SessionController,
    outbox: mpsc::UnboundedReceiver<Outbound>,
) -> (SessionHandle, JoinHandle<SessionSummary>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle { session_id: controller.id(), events: tx };
    let join = tokio::spawn(run_session(controller, rx, outbox));
    (handle, join)
}

async fn run_session(
    mut controller: SessionController,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut outbox: mpsc::UnboundedReceiver<Outbound>,
) -> SessionSummary {
    let session_id = controller.id();
    info!("session {}: actor started", session_id);
    let mut last_url = None;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Teardown) => {
                    debug!("session {}: teardown requested", session_id);
                    break;
                }
                Some(event) => apply(&mut controller, event),
                None => {
                    debug!("session {}: all handles dropped", session_id);
                    break;
                }
            },
            Some(outbound) = outbox.recv() => {
                controller.deliver(outbound);
            }
        }
        if let Some(url) = controller.displayed_url() {
            last_url = Some(url);
        }
    }

    controller.teardown();
    info!("session {}: actor stopped", session_id);
    SessionSummary { state: controller.state(), last_url }
}

fn apply(controller: &mut SessionController, event: SessionEvent) {
    match event {
        SessionEvent::Appear => controller.appear(),
        SessionEvent::NetworkChanged => controller.on_network_change(),
        SessionEvent::ConfigUpdated(config) => controller.update_config(config),
        SessionEvent::OverrideChanged(kind) => controller.set_override(kind),
        SessionEvent::NavigationResponse(response, reply) => {
            let _ = reply.send(controller.on_navigation_response(&response));
        }
        SessionEvent::LoadFinished => controller.on_load_finished(),
        SessionEvent::LoadFailed(failure) => controller.on_load_failed(&failure),
        SessionEvent::Challenge(challenge, reply) => {
            let _ = reply.send(controller.on_challenge(&challenge));
        }
        SessionEvent::Script(message) => controller.on_script_message(message),
        SessionEvent::Refresh => controller.refresh(),
        SessionEvent::Navigate(path) => {
            controller.navigate(&path);
        }
        SessionEvent::AdaptRequest(url, reply) => {
            let _ = reply.send(controller.adapt_request(&url));
        }
        SessionEvent::EnteredBackground => controller.enter_background(),
        SessionEvent::EnteredForeground => controller.enter_foreground(),
        SessionEvent::CurrentUrl(reply) => {
            let _ = reply.send(controller.displayed_url());
        }
        SessionEvent::Teardown => {}
    }
}

impl SessionHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Queues `event`.  Returns `false` once the session has stopped.
    pub fn send(&self, event: SessionEvent) -> bool {
        if self.events.send(event).is_err() {
            debug!("session {}: stopped, event dropped", self.session_id);
            return false;
        }
        true
    }

    pub fn appear(&self) -> bool {
        self.send(SessionEvent::Appear)
    }

    pub fn network_changed(&self) -> bool {
        self.send(SessionEvent::NetworkChanged)
    }

    pub fn script_message(&self, message: ScriptMessage) -> bool {
        self.send(SessionEvent::Script(message))
    }

    pub fn entered_background(&self) -> bool {
        self.send(SessionEvent::EnteredBackground)
    }

    pub fn entered_foreground(&self) -> bool {
        self.send(SessionEvent::EnteredForeground)
    }

    pub fn load_finished(&self) -> bool {
        self.send(SessionEvent::LoadFinished)
    }

    pub fn teardown(&self) -> bool {
        self.send(SessionEvent::Teardown)
    }

    /// Asks the session whether `response` may commit.  A stopped session
    /// cancels.
    pub async fn navigation_response(&self, response: NavigationResponse) -> NavigationPolicy {
        let (tx, rx) = oneshot::channel();
        if !self.send(SessionEvent::NavigationResponse(response, tx)) {
            return NavigationPolicy::Cancel;
        }
        rx.await.unwrap_or(NavigationPolicy::Cancel)
    }

    /// Forwards a challenge.  A stopped session asks for default handling.
    pub async fn challenge(&self, challenge: AuthChallenge) -> ChallengeResponse {
        let (tx, rx) = oneshot::channel();
        if !self.send(SessionEvent::Challenge(challenge, tx)) {
            return ChallengeResponse::default_handling();
        }
        rx.await.unwrap_or_else(|_| ChallengeResponse::default_handling())
    }

    /// Rewrites an outgoing request onto the active base.  A stopped session
    /// leaves it unchanged.
    pub async fn adapt_request(&self, url: Url) -> Url {
        let (tx, rx) = oneshot::channel();
        if !self.send(SessionEvent::AdaptRequest(url.clone(), tx)) {
            return url;
        }
        rx.await.unwrap_or(url)
    }

    pub async fn current_url(&self) -> Option<Url> {
        let (tx, rx) = oneshot::channel();
        if !self.send(SessionEvent::CurrentUrl(tx)) {
            return None;
        }
        rx.await.ok().flatten()
    }
}
