//! Inbound external-bus messages.
//!
//! Parsing is strict about the envelope (`type`, `id`, `payload`) and lenient
//! about everything inside `payload`, which belongs to the individual
//! handlers.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

/// Why an inbound message was rejected.
///
/// A rejected message has no side effects and never receives a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedBridgeMessage {
    /// The raw text was not valid JSON.
    #[error("message is not valid JSON: {0}")]
    InvalidJson(String),

    /// The top-level JSON value was not an object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// The `type` field is absent.
    #[error("message has no type")]
    MissingType,

    /// The `type` field is present but not a string.
    #[error("message type is not a string")]
    InvalidType,

    /// The `id` field is present but not an integer.
    #[error("message id is not an integer")]
    InvalidId,

    /// The `payload` field is present but not an object.
    #[error("message payload is not an object")]
    InvalidPayload,
}

/// Known external-bus message types.
///
/// Anything else parses as [`MessageKind::Unrecognized`] and is logged by the
/// dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ConfigGet,
    ConfigScreenShow,
    Haptic,
    ConnectionStatus,
    TagRead,
    TagWrite,
    ThemeUpdate,
    MatterCommission,
    ThreadImportCredentials,
    ThreadStoreInPlatformKeychain,
    BarCodeScan,
    BarCodeClose,
    BarCodeNotify,
    AssistShow,
    ImprovScan,
    ImprovConfigureDevice,
    Unrecognized(String),
}

impl MessageKind {
    /// Every recognised kind, in catalogue order.
    pub const KNOWN: [MessageKind; 16] = [
        MessageKind::ConfigGet,
        MessageKind::ConfigScreenShow,
        MessageKind::Haptic,
        MessageKind::ConnectionStatus,
        MessageKind::TagRead,
        MessageKind::TagWrite,
        MessageKind::ThemeUpdate,
        MessageKind::MatterCommission,
        MessageKind::ThreadImportCredentials,
        MessageKind::ThreadStoreInPlatformKeychain,
        MessageKind::BarCodeScan,
        MessageKind::BarCodeClose,
        MessageKind::BarCodeNotify,
        MessageKind::AssistShow,
        MessageKind::ImprovScan,
        MessageKind::ImprovConfigureDevice,
    ];

    /// Maps a wire name to a kind.  Never fails.
    pub fn from_wire(name: &str) -> Self {
        match name {
            "config/get" => MessageKind::ConfigGet,
            "config_screen/show" => MessageKind::ConfigScreenShow,
            "haptic" => MessageKind::Haptic,
            "connection-status" => MessageKind::ConnectionStatus,
            "tag/read" => MessageKind::TagRead,
            "tag/write" => MessageKind::TagWrite,
            "theme-update" => MessageKind::ThemeUpdate,
            "matter/commission" => MessageKind::MatterCommission,
            "thread/import_credentials" => MessageKind::ThreadImportCredentials,
            "thread/store_in_platform_keychain" => MessageKind::ThreadStoreInPlatformKeychain,
            "bar_code/scan" => MessageKind::BarCodeScan,
            "bar_code/close" => MessageKind::BarCodeClose,
            "bar_code/notify" => MessageKind::BarCodeNotify,
            "assist/show" => MessageKind::AssistShow,
            "improv/scan" => MessageKind::ImprovScan,
            "improv/configure_device" => MessageKind::ImprovConfigureDevice,
            other => MessageKind::Unrecognized(other.to_string()),
        }
    }

    /// The wire name.
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::ConfigGet => "config/get",
            MessageKind::ConfigScreenShow => "config_screen/show",
            MessageKind::Haptic => "haptic",
            MessageKind::ConnectionStatus => "connection-status",
            MessageKind::TagRead => "tag/read",
            MessageKind::TagWrite => "tag/write",
            MessageKind::ThemeUpdate => "theme-update",
            MessageKind::MatterCommission => "matter/commission",
            MessageKind::ThreadImportCredentials => "thread/import_credentials",
            MessageKind::ThreadStoreInPlatformKeychain => "thread/store_in_platform_keychain",
            MessageKind::BarCodeScan => "bar_code/scan",
            MessageKind::BarCodeClose => "bar_code/close",
            MessageKind::BarCodeNotify => "bar_code/notify",
            MessageKind::AssistShow => "assist/show",
            MessageKind::ImprovScan => "improv/scan",
            MessageKind::ImprovConfigureDevice => "improv/configure_device",
            MessageKind::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, MessageKind::Unrecognized(_))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inbound message from the embedded page.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeMessage {
    pub kind: MessageKind,
    /// Present only when the page expects a response.
    pub id: Option<i64>,
    pub payload: Option<Map<String, Value>>,
}

impl BridgeMessage {
    /// Parses a raw JSON value into a message.
    ///
    /// A `null` payload is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns a [`MalformedBridgeMessage`] variant describing the first
    /// envelope problem found.
    pub fn parse(raw: &Value) -> Result<Self, MalformedBridgeMessage> {
        let object = raw.as_object().ok_or(MalformedBridgeMessage::NotAnObject)?;

        let kind = match object.get("type") {
            None | Some(Value::Null) => return Err(MalformedBridgeMessage::MissingType),
            Some(Value::String(name)) => MessageKind::from_wire(name),
            Some(_) => return Err(MalformedBridgeMessage::InvalidType),
        };

        let id = match object.get("id") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_i64().ok_or(MalformedBridgeMessage::InvalidId)?),
        };

        let payload = match object.get("payload") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => return Err(MalformedBridgeMessage::InvalidPayload),
        };

        Ok(Self { kind, id, payload })
    }

    /// Parses raw JSON text.
    ///
    /// # Errors
    ///
    /// [`MalformedBridgeMessage::InvalidJson`] for unparseable text, otherwise
    /// the same errors as [`BridgeMessage::parse`].
    pub fn from_json_str(text: &str) -> Result<Self, MalformedBridgeMessage> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| MalformedBridgeMessage::InvalidJson(e.to_string()))?;
        Self::parse(&value)
    }

    /// The payload as a JSON value (`{}` when absent).
    pub fn payload_value(&self) -> Value {
        Value::Object(self.payload.clone().unwrap_or_default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
