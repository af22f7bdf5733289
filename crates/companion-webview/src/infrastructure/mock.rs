//! Recording collaborators for tests and the diagnostic binary.
//!
//! # Why recording doubles?
//!
//! The real collaborators (the platform web view, the keychain-backed token
//! store, the NFC reader, the hub HTTP client) need a device and a running
//! hub.  The types here replace them with in-memory recording: every call is
//! pushed into a `Mutex<Vec<...>>` so assertions can inspect exactly what the
//! session did and in what order.
//!
//! # Usage in tests
//!
//! ```ignore
//! let runtime = Arc::new(MockContentRuntime::new());
//! let (mut dispatcher, _rx) = BridgeDispatcher::new(Arc::downgrade(&(runtime.clone() as _)), id);
//!
//! dispatcher.dispatch(&json!({"type": "config/get", "id": 1}));
//!
//! assert_eq!(runtime.bus_messages()[0]["id"], 1);
//! ```
//!
//! # Failure flags
//!
//! [`MockContentRuntime::fail_scripts`], [`RecordingTagReader::failing`] and
//! [`RecordingHubApi::failing`] make the double return errors so error paths
//! can be tested without a broken device.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

use crate::application::ports::{
    AccessToken, ConnectionEvent, ConnectionStatusSink, ContentRuntime, HapticFeedback, HapticKind, HubApi,
    ScriptError, SessionUi, TagReader, TokenProvider, TrustEvaluator,
};
use crate::domain::{AuthChallenge, ChallengeResponse, SessionNotice};

const BUS_PREFIX: &str = "window.externalBus(";
const BUS_SUFFIX: &str = ");";

// ── Content runtime ───────────────────────────────────────────────────────────

/// Records loads, reloads and evaluated scripts.
///
/// `load` also sets the current URL, as a real engine eventually would.
#[derive(Default)]
pub struct MockContentRuntime {
    loads: Mutex<Vec<Url>>,
    reloads: AtomicUsize,
    scripts: Mutex<Vec<String>>,
    current_url: Mutex<Option<Url>>,
    fail_scripts: AtomicBool,
}

impl MockContentRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the page navigating on its own.
    pub fn set_current_url(&self, url: Option<Url>) {
        *self.current_url.lock().unwrap() = url;
    }

    pub fn loads(&self) -> Vec<Url> {
        self.loads.lock().unwrap().clone()
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Every script evaluated so far, bus writes included.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    /// The JSON bodies of every `window.externalBus(...)` write.
    pub fn bus_messages(&self) -> Vec<Value> {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| s.strip_prefix(BUS_PREFIX)?.strip_suffix(BUS_SUFFIX).map(str::to_string))
            .filter_map(|body| serde_json::from_str(&body).ok())
            .collect()
    }

    /// When set, `evaluate_script` fails without recording.
    pub fn fail_scripts(&self, fail: bool) {
        self.fail_scripts.store(fail, Ordering::SeqCst);
    }
}

impl ContentRuntime for MockContentRuntime {
    fn load(&self, url: &Url) {
        self.loads.lock().unwrap().push(url.clone());
        *self.current_url.lock().unwrap() = Some(url.clone());
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn evaluate_script(&self, script: &str) -> Result<(), ScriptError> {
        if self.fail_scripts.load(Ordering::SeqCst) {
            return Err(ScriptError("mock failure".into()));
        }
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(())
    }

    fn current_url(&self) -> Option<Url> {
        self.current_url.lock().unwrap().clone()
    }
}

// ── Haptics / connection status ───────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingHaptics {
    played: Mutex<Vec<HapticKind>>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<HapticKind> {
        self.played.lock().unwrap().clone()
    }
}

impl HapticFeedback for RecordingHaptics {
    fn play(&self, kind: HapticKind) {
        self.played.lock().unwrap().push(kind);
    }
}

#[derive(Default)]
pub struct RecordingConnectionStatus {
    events: Mutex<Vec<ConnectionEvent>>,
}

impl RecordingConnectionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ConnectionStatusSink for RecordingConnectionStatus {
    fn connection_status_changed(&self, event: ConnectionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ── Tags ──────────────────────────────────────────────────────────────────────

/// Returns a fixed tag and records writes.
#[derive(Default)]
pub struct RecordingTagReader {
    tag: Option<String>,
    writes: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingTagReader {
    pub fn with_tag(tag: &str) -> Self {
        Self { tag: Some(tag.to_string()), writes: Mutex::default() }
    }

    /// Every read and write fails.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(String, Option<String>)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl TagReader for RecordingTagReader {
    async fn read_tag(&self) -> anyhow::Result<String> {
        self.tag.clone().ok_or_else(|| anyhow!("no tag in range"))
    }

    async fn write_tag(&self, tag: &str, name: Option<&str>) -> anyhow::Result<()> {
        if self.tag.is_none() {
            return Err(anyhow!("tag reader unavailable"));
        }
        self.writes.lock().unwrap().push((tag.to_string(), name.map(str::to_string)));
        Ok(())
    }
}

// ── Tokens ────────────────────────────────────────────────────────────────────

/// A token store holding at most one token.
pub struct StaticTokenProvider {
    token: Mutex<Option<String>>,
    expires_in: u64,
}

impl StaticTokenProvider {
    pub fn with_token(token: &str) -> Self {
        Self { token: Mutex::new(Some(token.to_string())), expires_in: 1800 }
    }

    pub fn without_token() -> Self {
        Self { token: Mutex::new(None), expires_in: 1800 }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    fn has_token(&self) -> bool {
        self.token.lock().unwrap().is_some()
    }

    async fn access_token(&self, _force_refresh: bool) -> anyhow::Result<AccessToken> {
        let token = self.token.lock().unwrap().clone().ok_or_else(|| anyhow!("not logged in"))?;
        Ok(AccessToken { access_token: token, expires_in: self.expires_in })
    }

    async fn revoke(&self) -> anyhow::Result<()> {
        self.token.lock().unwrap().take();
        Ok(())
    }
}

// ── Hub API ───────────────────────────────────────────────────────────────────

/// Records one line per request, e.g. `call_service {api_url} light.turn_on`.
#[derive(Default)]
pub struct RecordingHubApi {
    calls: Mutex<Vec<String>>,
    should_fail: bool,
}

impl RecordingHubApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records each request, then fails it.
    pub fn failing() -> Self {
        Self { calls: Mutex::default(), should_fail: true }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.should_fail {
            return Err(anyhow!("hub unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl HubApi for RecordingHubApi {
    async fn call_service(
        &self,
        api_url: &Url,
        domain: &str,
        service: &str,
        _data: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        self.record(format!("call_service {} {}.{}", api_url, domain, service))
    }

    async fn fire_event(&self, api_url: &Url, event: &str, _data: &Map<String, Value>) -> anyhow::Result<()> {
        self.record(format!("fire_event {} {}", api_url, event))
    }

    async fn send_location(&self, webhook_url: &Url) -> anyhow::Result<()> {
        self.record(format!("send_location {}", webhook_url))
    }

    async fn render_template(
        &self,
        api_url: &Url,
        template: &str,
        _variables: &Map<String, Value>,
    ) -> anyhow::Result<String> {
        self.record(format!("render_template {} {}", api_url, template))?;
        Ok(template.to_string())
    }

    async fn complete_auth(&self, api_url: &Url, code: &str, _state: Option<&str>) -> anyhow::Result<()> {
        self.record(format!("complete_auth {} {}", api_url, code))
    }
}

// ── UI / trust ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingUi {
    notices: Mutex<Vec<SessionNotice>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<SessionNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl SessionUi for RecordingUi {
    fn notify(&self, notice: SessionNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

/// Answers every challenge with the same response and records the hosts.
pub struct FixedTrustEvaluator {
    response: ChallengeResponse,
    challenges: Mutex<Vec<AuthChallenge>>,
}

impl FixedTrustEvaluator {
    pub fn new(response: ChallengeResponse) -> Self {
        Self { response, challenges: Mutex::default() }
    }

    pub fn challenges(&self) -> Vec<AuthChallenge> {
        self.challenges.lock().unwrap().clone()
    }
}

impl Default for FixedTrustEvaluator {
    fn default() -> Self {
        Self::new(ChallengeResponse::default_handling())
    }
}

impl TrustEvaluator for FixedTrustEvaluator {
    fn evaluate(&self, challenge: &AuthChallenge) -> ChallengeResponse {
        self.challenges.lock().unwrap().push(challenge.clone());
        self.response.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_messages_ignores_plain_scripts() {
        let runtime = MockContentRuntime::new();
        runtime.evaluate_script("notifyThemeColors()").unwrap();
        runtime.evaluate_script(r#"window.externalBus({"id":1,"type":"result","result":{}});"#).unwrap();

        assert_eq!(runtime.scripts().len(), 2);
        assert_eq!(runtime.bus_messages(), vec![serde_json::json!({"id": 1, "type": "result", "result": {}})]);
    }

    #[test]
    fn test_load_sets_current_url() {
        let runtime = MockContentRuntime::new();
        let url = Url::parse("http://hub.local:8123/").unwrap();
        runtime.load(&url);
        assert_eq!(runtime.current_url(), Some(url));
    }

    #[tokio::test]
    async fn test_failing_hub_still_records() {
        let api = RecordingHubApi::failing();
        let target = Url::parse("https://hub.example.com/api/webhook/x").unwrap();
        assert!(api.send_location(&target).await.is_err());
        assert_eq!(api.calls().len(), 1);
    }
}
