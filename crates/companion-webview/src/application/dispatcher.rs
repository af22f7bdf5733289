//! External-bus dispatcher.
//!
//! Receives raw messages posted by the page, routes them by [`MessageKind`] to
//! a registered handler, and writes correlated results back through
//! `window.externalBus(json)`.
//!
//! # Threading model
//!
//! ```text
//! session context                       tokio worker
//! ───────────────                       ────────────
//! dispatch(raw) ── sync handler ──▶ send(response)
//!        │
//!        └─ async handler ─ spawn ─▶ handler.handle(payload).await
//!                                          │
//!    outbox rx ◀──── Outbound::Response ───┘
//!        │
//!    deliver(outbound) ──▶ send(response)
//! ```
//!
//! The content runtime is only ever touched from the session context.  Async
//! handlers never call `send` themselves; they post to the outbox and the
//! session drains it.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use companion_core::protocol::external_bus_script;
use companion_core::{BridgeMessage, BridgeResponse, MalformedBridgeMessage, MessageKind, OutboundMessage, OutgoingCommand};

use super::ports::ContentRuntime;
use crate::domain::SessionError;

// ── Handler types ─────────────────────────────────────────────────────────────

/// Failure inside a handler.  Turned into a negative result at the dispatch
/// boundary.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("no async runtime available")]
    NoRuntime,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// `Ok(Some(result))` answers with `result`, `Ok(None)` with `{}`.
pub type HandlerResult = Result<Option<Value>, HandlerError>;

type SyncHandlerFn = dyn Fn(&Value) -> HandlerResult + Send + Sync;

/// A handler whose work completes later.
#[async_trait]
pub trait AsyncHandler: Send + Sync {
    async fn handle(&self, payload: Value) -> HandlerResult;
}

struct FnAsyncHandler<F>(F);

#[async_trait]
impl<F, Fut> AsyncHandler for FnAsyncHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, payload: Value) -> HandlerResult {
        (self.0)(payload).await
    }
}

/// A registered `(payload) -> result?` mapping.
#[derive(Clone)]
pub enum Handler {
    /// Runs inline on the session context.
    Sync(Arc<SyncHandlerFn>),
    /// Runs on a tokio task; the result is marshalled back via the outbox.
    Async(Arc<dyn AsyncHandler>),
}

impl Handler {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    {
        Handler::Sync(Arc::new(f))
    }

    /// Wraps an async closure.
    pub fn from_async_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Handler::Async(Arc::new(FnAsyncHandler(f)))
    }
}

// ── Outbox ────────────────────────────────────────────────────────────────────

/// Work waiting to be performed on the session context.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Result of an async handler.
    Response(BridgeResponse),
    /// Native-initiated command (e.g. `restart` from the reconnect timer).
    Command(OutgoingCommand),
    /// Raw script, e.g. an external-auth callback.
    Script(String),
}

/// What a single `dispatch` call did.  Mostly useful for tests and logging.
#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    /// Envelope rejected; no side effects.
    Rejected(MalformedBridgeMessage),
    /// Type not recognised or no handler registered.
    Unhandled(MessageKind),
    /// Sync handler ran; `responded` tells whether a result was written.
    Completed { responded: bool },
    /// Async handler spawned.
    Pending,
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Routes external-bus messages to handlers and writes results back.
///
/// Holds only a [`Weak`] handle to the content runtime: the session controller
/// owns the runtime, and once it is released every `send` becomes a no-op.
pub struct BridgeDispatcher {
    session_id: Uuid,
    runtime: Weak<dyn ContentRuntime>,
    handlers: HashMap<MessageKind, Handler>,
    outbox: mpsc::UnboundedSender<Outbound>,
    next_command_id: i64,
}

impl BridgeDispatcher {
    /// Creates a dispatcher and the receiving end of its outbox.
    ///
    /// The receiver must be drained on the session context and each item
    /// passed to [`BridgeDispatcher::deliver`].
    pub fn new(runtime: Weak<dyn ContentRuntime>, session_id: Uuid) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbox, rx) = mpsc::unbounded_channel();
        let dispatcher = Self {
            session_id,
            runtime,
            handlers: HashMap::new(),
            outbox,
            next_command_id: 1,
        };
        (dispatcher, rx)
    }

    /// A sender for posting work back onto the session context.
    pub fn outbox(&self) -> mpsc::UnboundedSender<Outbound> {
        self.outbox.clone()
    }

    /// Registers (or replaces) the handler for `kind`.
    pub fn register_handler(&mut self, kind: MessageKind, handler: Handler) {
        if self.handlers.insert(kind.clone(), handler).is_some() {
            debug!("session {}: replaced handler for {}", self.session_id, kind);
        }
    }

    pub fn has_handler(&self, kind: &MessageKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Parses and routes one raw message.
    ///
    /// Never panics: malformed envelopes, unknown types, handler errors and
    /// handler panics are all contained here.
    pub fn dispatch(&self, raw: &Value) -> DispatchOutcome {
        let message = match BridgeMessage::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!("session {}: dropping malformed bridge message: {}", self.session_id, e);
                return DispatchOutcome::Rejected(e);
            }
        };

        if !message.kind.is_recognized() {
            warn!("session {}: unknown bridge message type {:?}", self.session_id, message.kind.as_str());
            return DispatchOutcome::Unhandled(message.kind);
        }

        let Some(handler) = self.handlers.get(&message.kind).cloned() else {
            warn!("session {}: no handler registered for {}", self.session_id, message.kind);
            return DispatchOutcome::Unhandled(message.kind);
        };

        debug!("session {}: dispatching {} (id {:?})", self.session_id, message.kind, message.id);
        let payload = message.payload_value();

        match handler {
            Handler::Sync(f) => {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| f(&payload)))
                    .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic.as_ref()))));
                let responded = match completion(self.session_id, &message, result) {
                    Some(response) => self.send(response),
                    None => false,
                };
                DispatchOutcome::Completed { responded }
            }
            Handler::Async(h) => {
                let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                    error!("session {}: {} needs an async runtime", self.session_id, message.kind);
                    let responded = match completion(self.session_id, &message, Err(HandlerError::NoRuntime)) {
                        Some(response) => self.send(response),
                        None => false,
                    };
                    return DispatchOutcome::Completed { responded };
                };
                let outbox = self.outbox.clone();
                let session_id = self.session_id;
                runtime.spawn(async move {
                    let result = AssertUnwindSafe(h.handle(payload))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic.as_ref()))));
                    if let Some(response) = completion(session_id, &message, result) {
                        if outbox.send(Outbound::Response(response)).is_err() {
                            debug!("session {}: outbox closed, dropping {} result", session_id, message.kind);
                        }
                    }
                });
                DispatchOutcome::Pending
            }
        }
    }

    /// Parses raw JSON text and routes it.
    pub fn dispatch_text(&self, text: &str) -> DispatchOutcome {
        match serde_json::from_str::<Value>(text) {
            Ok(raw) => self.dispatch(&raw),
            Err(e) => {
                let err = MalformedBridgeMessage::InvalidJson(e.to_string());
                warn!("session {}: dropping malformed bridge message: {}", self.session_id, err);
                DispatchOutcome::Rejected(err)
            }
        }
    }

    /// Writes a result into the page.  Returns `false` if nothing was sent.
    pub fn send(&self, response: BridgeResponse) -> bool {
        self.write(OutboundMessage::from(response))
    }

    /// Pushes a native-initiated command into the page.
    pub fn send_command(&mut self, command: OutgoingCommand) -> bool {
        let id = self.next_command_id;
        self.next_command_id += 1;
        self.write(command.into_outbound(id))
    }

    /// Performs an outbox item on the session context.
    pub fn deliver(&mut self, outbound: Outbound) -> bool {
        match outbound {
            Outbound::Response(response) => self.send(response),
            Outbound::Command(command) => self.send_command(command),
            Outbound::Script(script) => self.evaluate(&script),
        }
    }

    /// Evaluates `script` in the runtime, if it is still alive.
    pub fn evaluate(&self, script: &str) -> bool {
        let Some(runtime) = self.runtime.upgrade() else {
            debug!("session {}: content runtime released, dropping script", self.session_id);
            return false;
        };
        match runtime.evaluate_script(script) {
            Ok(()) => true,
            Err(e) => {
                error!("session {}: {}", self.session_id, e);
                false
            }
        }
    }

    fn write(&self, message: OutboundMessage) -> bool {
        match message.to_json() {
            Ok(json) => self.evaluate(&external_bus_script(&json)),
            Err(e) => {
                error!("session {}: failed to serialize bus message: {}", self.session_id, e);
                false
            }
        }
    }
}

/// Maps a handler result to the response owed for `message`, if any.
fn completion(session_id: Uuid, message: &BridgeMessage, result: HandlerResult) -> Option<BridgeResponse> {
    match (message.id, result) {
        (Some(id), Ok(value)) => Some(BridgeResponse::new(id, value.unwrap_or_else(|| json!({})))),
        (Some(id), Err(e)) => {
            warn!("session {}: {} (id {})", session_id, handler_failure(message, &e), id);
            Some(BridgeResponse::failure(id, e.to_string()))
        }
        (None, Ok(_)) => None,
        (None, Err(e)) => {
            warn!("session {}: {}", session_id, handler_failure(message, &e));
            None
        }
    }
}

fn handler_failure(message: &BridgeMessage, error: &HandlerError) -> SessionError {
    SessionError::HandlerFailure { kind: message.kind.to_string(), message: error.to_string() }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::MockContentRuntime;

    fn setup() -> (Arc<MockContentRuntime>, BridgeDispatcher, mpsc::UnboundedReceiver<Outbound>) {
        let runtime = Arc::new(MockContentRuntime::new());
        let weak: Weak<dyn ContentRuntime> = Arc::downgrade(&(runtime.clone() as Arc<dyn ContentRuntime>));
        let (dispatcher, rx) = BridgeDispatcher::new(weak, Uuid::new_v4());
        (runtime, dispatcher, rx)
    }

    #[test]
    fn test_sync_handler_with_id_sends_one_result() {
        // Arrange
        let (runtime, mut dispatcher, _rx) = setup();
        dispatcher.register_handler(MessageKind::ConfigGet, Handler::sync(|_| Ok(Some(json!({"a": 1})))));

        // Act
        let outcome = dispatcher.dispatch(&json!({"type": "config/get", "id": 4}));

        // Assert
        assert_eq!(outcome, DispatchOutcome::Completed { responded: true });
        assert_eq!(runtime.bus_messages(), vec![json!({"id": 4, "type": "result", "result": {"a": 1}})]);
    }

    #[test]
    fn test_sync_handler_without_id_sends_nothing() {
        let (runtime, mut dispatcher, _rx) = setup();
        dispatcher.register_handler(MessageKind::Haptic, Handler::sync(|_| Ok(Some(json!({"ignored": true})))));

        let outcome = dispatcher.dispatch(&json!({"type": "haptic"}));

        assert_eq!(outcome, DispatchOutcome::Completed { responded: false });
        assert!(runtime.scripts().is_empty());
    }

    #[test]
    fn test_none_result_with_id_answers_empty_object() {
        let (runtime, mut dispatcher, _rx) = setup();
        dispatcher.register_handler(MessageKind::BarCodeClose, Handler::sync(|_| Ok(None)));

        dispatcher.dispatch(&json!({"type": "bar_code/close", "id": 9}));

        assert_eq!(runtime.bus_messages(), vec![json!({"id": 9, "type": "result", "result": {}})]);
    }

    #[test]
    fn test_missing_type_is_rejected_without_response() {
        let (runtime, dispatcher, _rx) = setup();
        let outcome = dispatcher.dispatch(&json!({"id": 1, "payload": {}}));
        assert_eq!(outcome, DispatchOutcome::Rejected(MalformedBridgeMessage::MissingType));
        assert!(runtime.scripts().is_empty());
    }

    #[test]
    fn test_unrecognized_type_is_unhandled_without_response() {
        let (runtime, dispatcher, _rx) = setup();
        let outcome = dispatcher.dispatch(&json!({"type": "does/not/exist", "id": 2}));
        assert_eq!(outcome, DispatchOutcome::Unhandled(MessageKind::Unrecognized("does/not/exist".into())));
        assert!(runtime.scripts().is_empty());
    }

    #[test]
    fn test_known_type_without_handler_is_unhandled() {
        let (runtime, dispatcher, _rx) = setup();
        let outcome = dispatcher.dispatch(&json!({"type": "assist/show", "id": 2}));
        assert_eq!(outcome, DispatchOutcome::Unhandled(MessageKind::AssistShow));
        assert!(runtime.scripts().is_empty());
    }

    #[test]
    fn test_dispatch_text_rejects_invalid_json() {
        let (_runtime, dispatcher, _rx) = setup();
        assert!(matches!(dispatcher.dispatch_text("{"), DispatchOutcome::Rejected(MalformedBridgeMessage::InvalidJson(_))));
    }

    #[test]
    fn test_sync_handler_error_becomes_negative_result() {
        // Arrange
        let (runtime, mut dispatcher, _rx) = setup();
        dispatcher.register_handler(
            MessageKind::TagWrite,
            Handler::sync(|_| Err(HandlerError::InvalidPayload("tag missing".into()))),
        );

        // Act
        dispatcher.dispatch(&json!({"type": "tag/write", "id": 5}));

        // Assert
        assert_eq!(
            runtime.bus_messages(),
            vec![json!({"id": 5, "type": "result", "result": {"success": false, "error": "invalid payload: tag missing"}})]
        );
    }

    #[test]
    fn test_sync_handler_panic_is_contained() {
        let (runtime, mut dispatcher, _rx) = setup();
        dispatcher.register_handler(MessageKind::ImprovScan, Handler::sync(|_| panic!("scanner exploded")));

        let with_id = dispatcher.dispatch(&json!({"type": "improv/scan", "id": 11}));
        let without_id = dispatcher.dispatch(&json!({"type": "improv/scan"}));

        assert_eq!(with_id, DispatchOutcome::Completed { responded: true });
        assert_eq!(without_id, DispatchOutcome::Completed { responded: false });
        let messages = runtime.bus_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["result"]["success"], false);
        assert_eq!(messages[0]["result"]["error"], "handler panicked: scanner exploded");
    }

    #[test]
    fn test_send_after_runtime_released_is_noop() {
        // Arrange
        let (runtime, dispatcher, _rx) = setup();
        drop(runtime);

        // Act
        let sent = dispatcher.send(BridgeResponse::new(1, json!({})));

        // Assert
        assert!(!sent);
    }

    #[test]
    fn test_script_error_is_reported_as_not_sent() {
        let (runtime, dispatcher, _rx) = setup();
        runtime.fail_scripts(true);
        assert!(!dispatcher.send(BridgeResponse::new(1, json!({}))));
    }

    #[test]
    fn test_command_ids_increase() {
        let (runtime, mut dispatcher, _rx) = setup();
        dispatcher.send_command(OutgoingCommand::restart());
        dispatcher.send_command(OutgoingCommand::navigate("/logbook"));
        let ids: Vec<i64> = runtime.bus_messages().iter().filter_map(|m| m["id"].as_i64()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_async_handler_result_arrives_via_outbox() {
        // Arrange
        let (runtime, mut dispatcher, mut rx) = setup();
        dispatcher.register_handler(
            MessageKind::TagRead,
            Handler::from_async_fn(|_| async { Ok(Some(json!({"success": true, "tag": "abc"}))) }),
        );

        // Act
        let outcome = dispatcher.dispatch(&json!({"type": "tag/read", "id": 7}));
        let outbound = rx.recv().await.expect("async result posted");
        assert!(runtime.scripts().is_empty(), "runtime must not be touched off the session context");
        dispatcher.deliver(outbound);

        // Assert
        assert_eq!(outcome, DispatchOutcome::Pending);
        assert_eq!(
            runtime.bus_messages(),
            vec![json!({"id": 7, "type": "result", "result": {"success": true, "tag": "abc"}})]
        );
    }

    #[tokio::test]
    async fn test_async_handler_panic_becomes_negative_result() {
        let (_runtime, mut dispatcher, mut rx) = setup();
        dispatcher.register_handler(
            MessageKind::MatterCommission,
            Handler::from_async_fn(|_| async { panic!("commissioning failed") }),
        );

        dispatcher.dispatch(&json!({"type": "matter/commission", "id": 3}));
        let outbound = rx.recv().await.expect("failure posted");

        assert_eq!(
            outbound,
            Outbound::Response(BridgeResponse::failure(3, "handler panicked: commissioning failed"))
        );
    }

    #[test]
    fn test_async_handler_without_runtime_fails_fast() {
        let (runtime, mut dispatcher, _rx) = setup();
        dispatcher.register_handler(MessageKind::TagRead, Handler::from_async_fn(|_| async { Ok(None) }));

        let outcome = dispatcher.dispatch(&json!({"type": "tag/read", "id": 1}));

        assert_eq!(outcome, DispatchOutcome::Completed { responded: true });
        assert_eq!(runtime.bus_messages()[0]["result"]["error"], "no async runtime available");
    }
}
