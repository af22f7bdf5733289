//! Session controller: the navigation state machine of one web view.
//!
//! The controller owns the content runtime, exactly one [`BridgeDispatcher`],
//! the reconnect supervisor and the external-auth bridge.  It consults the
//! resolver for what to load, routes script messages, forwards trust
//! challenges, and recovers from stale restored pages.
//!
//! All methods run on the session context.  Work finished elsewhere (async
//! handlers, token requests, the reconnect timer) arrives on the outbox
//! receiver returned by [`SessionController::new`] and is applied with
//! [`SessionController::deliver`].

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use companion_core::resolver::{self, EXTERNAL_AUTH_PARAM};
use companion_core::{ConnectionConfig, EndpointKind, MessageKind, NetworkSignalSource, OutgoingCommand, ResolvedConnection};

use super::dispatcher::{BridgeDispatcher, DispatchOutcome, Handler, Outbound};
use super::external_auth::ExternalAuthBridge;
use super::handlers::{register_builtin_handlers, BuiltinHandlers};
use super::ports::{ContentRuntime, SessionUi, TokenProvider, TrustEvaluator};
use super::reconnect::ReconnectSupervisor;
use crate::domain::{
    AuthChallenge, ChallengeResponse, FailureReason, LinkTarget, LoadFailure, NavigationPolicy, NavigationResponse, ScriptMessage,
    SessionConfig, SessionError, SessionNotice, SessionState,
};

/// Page the runtime shows while no endpoint is available.
pub const BLANK_PAGE: &str = "about:blank";

/// Script asking an already-loaded frontend to reconnect if it lost its
/// connection, instead of reloading the whole page.
pub const CHECK_CONNECTION_SCRIPT: &str = "checkForMissingHassConnectionAndReload()";

/// Injected collaborators of a session.
pub struct SessionCollaborators {
    pub runtime: Arc<dyn ContentRuntime>,
    pub signals: Arc<dyn NetworkSignalSource>,
    pub trust: Arc<dyn TrustEvaluator>,
    pub tokens: Arc<dyn TokenProvider>,
    pub ui: Arc<dyn SessionUi>,
}

pub struct SessionController {
    id: Uuid,
    state: SessionState,
    config: ConnectionConfig,
    settings: SessionConfig,

    runtime: Option<Arc<dyn ContentRuntime>>,
    runtime_handle: Weak<dyn ContentRuntime>,
    dispatcher: Option<BridgeDispatcher>,
    auth: ExternalAuthBridge,
    reconnect: ReconnectSupervisor,

    signals: Arc<dyn NetworkSignalSource>,
    trust: Arc<dyn TrustEvaluator>,
    tokens: Arc<dyn TokenProvider>,
    ui: Arc<dyn SessionUi>,

    /// Deep link saved from a previous run, if restoring is enabled.
    restored_url: Option<Url>,
    requested_url: Option<Url>,
    last_navigation_was_server_error: bool,
    backgrounded: bool,
}

impl SessionController {
    /// Creates a controller in [`SessionState::Idle`] and the receiving end
    /// of its outbox.
    pub fn new(
        config: ConnectionConfig,
        settings: SessionConfig,
        collaborators: SessionCollaborators,
        restored_url: Option<Url>,
    ) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let id = Uuid::new_v4();
        let SessionCollaborators { runtime, signals, trust, tokens, ui } = collaborators;

        let weak: Weak<dyn ContentRuntime> = Arc::downgrade(&runtime);
        let (dispatcher, outbox_rx) = BridgeDispatcher::new(weak.clone(), id);
        let auth = ExternalAuthBridge::new(id, Arc::clone(&tokens), dispatcher.outbox());
        let reconnect =
            ReconnectSupervisor::new(id, settings.reconnect_check_interval, settings.background_restart_threshold);
        let restored_url = restored_url.filter(|_| settings.restore_last_url);

        info!("session {}: created", id);
        let controller = Self {
            id,
            state: SessionState::Idle,
            config,
            settings,
            runtime: Some(runtime),
            runtime_handle: weak,
            dispatcher: Some(dispatcher),
            auth,
            reconnect,
            signals,
            trust,
            tokens,
            ui,
            restored_url,
            requested_url: None,
            last_navigation_was_server_error: false,
            backgrounded: false,
        };
        (controller, outbox_rx)
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Last URL this controller asked the runtime to load.
    pub fn requested_url(&self) -> Option<&Url> {
        self.requested_url.as_ref()
    }

    pub fn restored_url(&self) -> Option<&Url> {
        self.restored_url.as_ref()
    }

    pub fn is_reconnect_scheduled(&self) -> bool {
        self.reconnect.is_scheduled()
    }

    /// Resolves against the current configuration and network signal.
    pub fn resolve_current(&self) -> Option<ResolvedConnection> {
        resolver::resolve(&self.config, &self.signals.current_signal())
    }

    // ── Handler registration ─────────────────────────────────────────────────

    pub fn register_handler(&mut self, kind: MessageKind, handler: Handler) {
        if let Some(dispatcher) = self.dispatcher.as_mut() {
            dispatcher.register_handler(kind, handler);
        }
    }

    pub fn install_builtin_handlers(&mut self, builtins: BuiltinHandlers) {
        let runtime = self.runtime_handle.clone();
        if let Some(dispatcher) = self.dispatcher.as_mut() {
            register_builtin_handlers(dispatcher, runtime, builtins);
        }
    }

    // ── Configuration (single writer) ────────────────────────────────────────

    /// Replaces the connection configuration and re-evaluates what to show.
    pub fn update_config(&mut self, config: ConnectionConfig) {
        self.config = config;
        self.on_network_change();
    }

    /// Forces (or clears) an endpoint override.
    pub fn set_override(&mut self, kind: Option<EndpointKind>) {
        debug!("session {}: override set to {:?}", self.id, kind);
        self.config.override_kind = kind;
        self.on_network_change();
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// The owning view appeared for the first time.
    pub fn appear(&mut self) {
        self.load_active_url_if_needed();
    }

    /// The network signal changed.  Reloads only when the active URL moved to
    /// a different base than the one displayed.
    pub fn on_network_change(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let Some(resolved) = self.resolve_current() else {
            self.enter_no_endpoint();
            return;
        };
        let displayed = self.displayed_url();
        let unchanged = displayed.as_ref().map(|d| resolver::same_base(d, &resolved.active_url)).unwrap_or(false);
        if unchanged && self.state != SessionState::NoEndpoint {
            debug!("session {}: network changed, still on {}", self.id, resolved.active_kind);
            return;
        }
        info!("session {}: active endpoint is now {} ({})", self.id, resolved.active_kind, resolved.active_url);
        self.load_active_url_if_needed();
    }

    pub fn enter_background(&mut self) {
        self.backgrounded = true;
        if self.state == SessionState::Closed || !self.settings.restart_on_background_stall {
            return;
        }
        if let Some(dispatcher) = self.dispatcher.as_ref() {
            self.reconnect.schedule(dispatcher.outbox());
        }
    }

    pub fn enter_foreground(&mut self) {
        self.backgrounded = false;
        self.reconnect.cancel();
    }

    /// Releases the dispatcher and runtime.  Pending async completions become
    /// no-ops.
    pub fn teardown(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.reconnect.cancel();
        self.dispatcher = None;
        self.runtime = None;
        self.state = SessionState::Closed;
        info!("session {}: closed", self.id);
    }

    // ── Loading ──────────────────────────────────────────────────────────────

    /// Loads the resolver's current URL unless it is already displayed.
    pub fn load_active_url_if_needed(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let Some(resolved) = self.resolve_current() else {
            self.enter_no_endpoint();
            return;
        };
        if self.state == SessionState::NoEndpoint {
            self.ui.notify(SessionNotice::EndpointAvailable);
        }

        let desired = resolver::webview_url(&resolved, self.tokens.has_token());
        let current = self.displayed_url();

        if let Some(current) = current.as_ref().filter(|c| resolver::same_base(c, &desired)) {
            if self.state != SessionState::NoEndpoint && self.state != SessionState::Idle {
                debug!("session {}: {} already displayed, checking connection", self.id, current);
                self.evaluate(CHECK_CONNECTION_SCRIPT);
                return;
            }
        }

        if self.backgrounded {
            debug!("session {}: backgrounded, deferring load", self.id);
            return;
        }

        let target = self.choose_target(&desired, current.as_ref());
        self.load(target, SessionState::Loading);
    }

    /// Reloads the page, or loads the default URL when the last navigation hit
    /// a server error or the base changed.
    pub fn refresh(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        let Some(resolved) = self.resolve_current() else {
            self.enter_no_endpoint();
            return;
        };
        let desired = resolver::webview_url(&resolved, self.tokens.has_token());
        let same_base = self.displayed_url().map(|c| resolver::same_base(&c, &desired)).unwrap_or(false);

        if same_base && !self.last_navigation_was_server_error {
            if let Some(runtime) = self.runtime.as_ref() {
                debug!("session {}: reloading", self.id);
                runtime.reload();
                self.state = SessionState::Loading;
            }
        } else {
            self.load(desired, SessionState::Loading);
        }
    }

    /// Asks the frontend to navigate to `path` without a page load.
    pub fn navigate(&mut self, path: &str) -> bool {
        match self.dispatcher.as_mut() {
            Some(dispatcher) => dispatcher.send_command(OutgoingCommand::navigate(path)),
            None => false,
        }
    }

    /// Hub pages under the ignored paths (and foreign hosts) open externally.
    pub fn decide_link(&self, url: &Url) -> LinkTarget {
        let is_hub = resolver::classify_url(&self.config, url).is_some()
            || self.resolve_current().map(|r| resolver::same_base(&r.active_url, url)).unwrap_or(false);
        let ignored = self
            .settings
            .external_open_paths
            .iter()
            .any(|p| url.path() == p || url.path().starts_with(&format!("{}/", p)));
        if is_hub && !ignored {
            LinkTarget::InApp
        } else {
            self.ui.notify(SessionNotice::OpenExternally(url.clone()));
            LinkTarget::External
        }
    }

    /// Rewrites a request aimed at any configured endpoint onto the active
    /// base, so hard-coded links from another network path keep working.
    ///
    /// Requests for other hosts, and every request while no endpoint
    /// resolves, are returned unchanged.
    pub fn adapt_request(&self, url: &Url) -> Url {
        match self.resolve_current() {
            Some(resolved) if self.state != SessionState::Closed => resolver::adapt_url(&resolved, &self.config, url),
            _ => url.clone(),
        }
    }

    // ── Runtime callbacks ────────────────────────────────────────────────────

    /// Decides whether a navigation response may commit.
    pub fn on_navigation_response(&mut self, response: &NavigationResponse) -> NavigationPolicy {
        if self.state == SessionState::Closed {
            return NavigationPolicy::Cancel;
        }
        self.last_navigation_was_server_error = false;

        if !response.is_main_frame || response.status < 400 {
            return NavigationPolicy::Allow;
        }
        self.last_navigation_was_server_error = true;

        if self.restored_url.as_ref() != Some(&response.url) {
            let error = SessionError::TransportFailure {
                url: Some(response.url.clone()),
                reason: format!("HTTP {}", response.status),
            };
            self.surface(error);
            return NavigationPolicy::Allow;
        }

        let stale = SessionError::StaleRestoredPage { url: response.url.clone(), status: response.status };
        info!("session {}: {}, recovering with default URL", self.id, stale);
        self.restored_url = None;
        self.ui.notify(SessionNotice::RestoredUrlCleared);

        match self.resolve_current() {
            Some(resolved) => {
                let url = resolver::webview_url(&resolved, self.tokens.has_token());
                self.load(url, SessionState::Recovering);
                NavigationPolicy::Cancel
            }
            None => {
                self.enter_no_endpoint();
                NavigationPolicy::Allow
            }
        }
    }

    pub fn on_load_finished(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        debug!("session {}: load finished ({})", self.id, self.state);
        self.state = SessionState::Loaded;
        self.restored_url = None;
        self.reconnect.cancel();
    }

    pub fn on_load_failed(&mut self, failure: &LoadFailure) {
        if self.state == SessionState::Closed {
            return;
        }
        if failure.is_cancellation() {
            debug!("session {}: load cancelled", self.id);
            return;
        }
        let reason = match &failure.reason {
            FailureReason::Other(reason) => reason.clone(),
            FailureReason::Cancelled => String::new(),
        };
        self.surface(SessionError::TransportFailure { url: failure.url.clone(), reason });
    }

    /// Forwards a TLS / client-certificate challenge to the trust evaluator
    /// and returns its answer unchanged.
    pub fn on_challenge(&self, challenge: &AuthChallenge) -> ChallengeResponse {
        let response = self.trust.evaluate(challenge);
        if response.disposition.is_rejection() {
            let error = SessionError::CertificateRejected { host: challenge.host.clone() };
            warn!("session {}: {} ({:?})", self.id, error, challenge.method);
        }
        response
    }

    /// Routes a message posted on one of the injected script channels.
    pub fn on_script_message(&mut self, message: ScriptMessage) {
        if self.state == SessionState::Closed {
            debug!("session {}: closed, ignoring script message", self.id);
            return;
        }
        match message {
            ScriptMessage::ExternalBus(raw) => {
                if let Some(dispatcher) = self.dispatcher.as_ref() {
                    if let DispatchOutcome::Rejected(e) = dispatcher.dispatch(&raw) {
                        debug!("session {}: {}", self.id, SessionError::from(e));
                    }
                }
            }
            ScriptMessage::GetExternalAuth { callback, force } => {
                self.auth.get_external_auth(&callback, force);
            }
            ScriptMessage::RevokeExternalAuth { callback } => {
                self.auth.revoke_external_auth(&callback);
            }
        }
    }

    /// Applies one outbox item on the session context.
    pub fn deliver(&mut self, outbound: Outbound) -> bool {
        match self.dispatcher.as_mut() {
            Some(dispatcher) => dispatcher.deliver(outbound),
            None => {
                debug!("session {}: closed, dropping {:?}", self.id, outbound_kind(&outbound));
                false
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    /// URL currently committed in the runtime, ignoring the blank page.
    pub fn displayed_url(&self) -> Option<Url> {
        self.runtime
            .as_ref()
            .and_then(|r| r.current_url())
            .filter(|u| u.scheme() != "about")
    }

    fn choose_target(&self, desired: &Url, current: Option<&Url>) -> Url {
        if let Some(restored) = self.restored_url.as_ref().filter(|r| resolver::same_base(r, desired)) {
            debug!("session {}: restoring {}", self.id, restored);
            return restored.clone();
        }
        match current {
            Some(current) if current.path() != "/" && !current.path().is_empty() => carry_location(desired, current),
            _ => desired.clone(),
        }
    }

    fn load(&mut self, url: Url, state: SessionState) {
        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };
        info!("session {}: loading {}", self.id, url);
        runtime.load(&url);
        self.requested_url = Some(url);
        self.state = state;
    }

    fn enter_no_endpoint(&mut self) {
        if self.state == SessionState::NoEndpoint {
            return;
        }
        if let Some(runtime) = self.runtime.as_ref() {
            if let Ok(blank) = Url::parse(BLANK_PAGE) {
                runtime.load(&blank);
            }
        }
        self.requested_url = None;
        self.state = SessionState::NoEndpoint;
        self.surface(SessionError::NoEndpointAvailable);
    }

    /// Shows user-visible errors; everything else is only logged.
    fn surface(&self, error: SessionError) {
        if error.is_user_visible() {
            warn!("session {}: {}", self.id, error);
            self.ui.notify(SessionNotice::Error(error));
        } else {
            debug!("session {}: {}", self.id, error);
        }
    }

    fn evaluate(&self, script: &str) {
        if let Some(dispatcher) = self.dispatcher.as_ref() {
            dispatcher.evaluate(script);
        }
    }
}

/// Keeps the page the user was on when the base changes: path, query (minus
/// `external_auth`) and fragment move onto `desired`.
fn carry_location(desired: &Url, current: &Url) -> Url {
    let mut url = desired.clone();
    let prefix = desired.path().trim_end_matches('/');
    url.set_path(&format!("{}{}", prefix, current.path()));

    let mut pairs: Vec<(String, String)> = desired.query_pairs().into_owned().collect();
    pairs.extend(current.query_pairs().into_owned().filter(|(k, _)| k != EXTERNAL_AUTH_PARAM));
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.set_fragment(current.fragment());
    url
}

fn outbound_kind(outbound: &Outbound) -> &'static str {
    match outbound {
        Outbound::Response(_) => "response",
        Outbound::Command(_) => "command",
        Outbound::Script(_) => "script",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
