//! Built-in external-bus handlers.
//!
//! These cover the message types whose behaviour is fully defined by the host
//! (capabilities, haptics, connection status, tags, theme).  The remaining
//! catalogue entries (Matter, Thread, bar codes, Assist, Improv) depend on
//! platform UI flows and are registered by the embedding application.

use std::sync::{Arc, Weak};

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use companion_core::MessageKind;

use super::dispatcher::{BridgeDispatcher, Handler, HandlerError, HandlerResult};
use super::ports::{
    ConnectionEvent, ConnectionStatusSink, ContentRuntime, HapticFeedback, HapticKind, TagReader,
};
use crate::domain::HostCapabilities;

/// Script the page exposes for re-reading its theme colors.
pub const NOTIFY_THEME_COLORS_SCRIPT: &str = "notifyThemeColors()";

/// Collaborators needed by the built-in handlers.
pub struct BuiltinHandlers {
    pub capabilities: HostCapabilities,
    pub haptics: Arc<dyn HapticFeedback>,
    pub connection_status: Arc<dyn ConnectionStatusSink>,
    pub tags: Arc<dyn TagReader>,
}

/// Registers every built-in handler on `dispatcher`.
pub fn register_builtin_handlers(
    dispatcher: &mut BridgeDispatcher,
    runtime: Weak<dyn ContentRuntime>,
    builtins: BuiltinHandlers,
) {
    dispatcher.register_handler(MessageKind::ConfigGet, config_get(builtins.capabilities));
    dispatcher.register_handler(MessageKind::Haptic, haptic(builtins.haptics));
    dispatcher.register_handler(MessageKind::ConnectionStatus, connection_status(builtins.connection_status));
    dispatcher.register_handler(MessageKind::TagRead, tag_read(Arc::clone(&builtins.tags)));
    dispatcher.register_handler(MessageKind::TagWrite, tag_write(builtins.tags));
    dispatcher.register_handler(MessageKind::ThemeUpdate, theme_update(runtime));
}

/// `config/get` → the capabilities object.
pub fn config_get(capabilities: HostCapabilities) -> Handler {
    Handler::sync(move |_| {
        let value = serde_json::to_value(&capabilities).map_err(|e| HandlerError::Other(e.into()))?;
        Ok(Some(value))
    })
}

/// `haptic` with `{"hapticType": ...}`.  Unknown types are logged and ignored.
pub fn haptic(engine: Arc<dyn HapticFeedback>) -> Handler {
    Handler::sync(move |payload| {
        let name = payload.get("hapticType").and_then(Value::as_str).unwrap_or_default();
        match HapticKind::from_wire(name) {
            Some(kind) => engine.play(kind),
            None => info!("unknown haptic type {:?}", name),
        }
        Ok(None)
    })
}

/// `connection-status` with `{"event": "connected" | "disconnected" | "auth-invalid"}`.
pub fn connection_status(sink: Arc<dyn ConnectionStatusSink>) -> Handler {
    Handler::sync(move |payload| {
        let name = payload.get("event").and_then(Value::as_str).unwrap_or_default();
        let event = ConnectionEvent::from_wire(name)
            .ok_or_else(|| HandlerError::InvalidPayload(format!("unknown connection event {:?}", name)))?;
        debug!("frontend connection status: {:?}", event);
        sink.connection_status_changed(event);
        Ok(None)
    })
}

/// `tag/read` → `{"success": true, "tag": ...}` or `{"success": false}`.
pub fn tag_read(reader: Arc<dyn TagReader>) -> Handler {
    Handler::from_async_fn(move |_| {
        let reader = Arc::clone(&reader);
        async move {
            match reader.read_tag().await {
                Ok(tag) => Ok(Some(json!({ "success": true, "tag": tag }))),
                Err(e) => {
                    warn!("tag read failed: {:#}", e);
                    Ok(Some(json!({ "success": false })))
                }
            }
        }
    })
}

/// `tag/write` with `{"tag": ..., "name"?: ...}` → `{"success": bool}`.
pub fn tag_write(reader: Arc<dyn TagReader>) -> Handler {
    Handler::from_async_fn(move |payload| {
        let reader = Arc::clone(&reader);
        async move { write_tag(reader.as_ref(), &payload).await }
    })
}

async fn write_tag(reader: &dyn TagReader, payload: &Value) -> HandlerResult {
    let tag = payload.get("tag").and_then(Value::as_str).unwrap_or_default();
    if tag.is_empty() {
        warn!("tag write requested without a tag");
        return Ok(Some(json!({ "success": false })));
    }
    let name = payload.get("name").and_then(Value::as_str);
    let success = match reader.write_tag(tag, name).await {
        Ok(()) => true,
        Err(e) => {
            warn!("tag write failed: {:#}", e);
            false
        }
    };
    Ok(Some(json!({ "success": success })))
}

/// `theme-update` → ask the page to re-send its theme colors.
pub fn theme_update(runtime: Weak<dyn ContentRuntime>) -> Handler {
    Handler::sync(move |_| {
        if let Some(runtime) = runtime.upgrade() {
            runtime
                .evaluate_script(NOTIFY_THEME_COLORS_SCRIPT)
                .map_err(|e| HandlerError::Other(e.into()))?;
        }
        Ok(None)
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
