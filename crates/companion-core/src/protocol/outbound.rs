//! Host → page messages: correlated results and native-initiated commands.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Serialized shape of everything the host sends over the bus.
///
/// The `type` tag is `"result"` or `"command"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Result {
        id: i64,
        result: Value,
    },
    Command {
        id: i64,
        command: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        payload: Option<Value>,
    },
}

impl OutboundMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Reply to an inbound message that carried an `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeResponse {
    pub id: i64,
    pub result: Value,
}

impl BridgeResponse {
    pub fn new(id: i64, result: Value) -> Self {
        Self { id, result }
    }

    /// Best-effort negative result: `{"success": false, "error": message}`.
    pub fn failure(id: i64, message: impl Into<String>) -> Self {
        Self { id, result: json!({ "success": false, "error": message.into() }) }
    }
}

impl From<BridgeResponse> for OutboundMessage {
    fn from(response: BridgeResponse) -> Self {
        OutboundMessage::Result { id: response.id, result: response.result }
    }
}

/// Commands the host can push to the page without being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Tear down and re-open the frontend's live-data connection.
    Restart,
    Navigate,
    ImprovDiscoveredDevice,
    ShowAutomationEditor,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Restart => "restart",
            CommandKind::Navigate => "navigate",
            CommandKind::ImprovDiscoveredDevice => "improv/discovered_device",
            CommandKind::ShowAutomationEditor => "show-automation-editor",
        }
    }
}

/// A native-initiated command.  The dispatcher assigns the id on send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingCommand {
    pub kind: CommandKind,
    pub payload: Option<Value>,
}

impl OutgoingCommand {
    pub fn restart() -> Self {
        Self { kind: CommandKind::Restart, payload: None }
    }

    pub fn navigate(path: &str) -> Self {
        Self { kind: CommandKind::Navigate, payload: Some(json!({ "path": path })) }
    }

    pub fn improv_discovered_device(name: &str) -> Self {
        Self { kind: CommandKind::ImprovDiscoveredDevice, payload: Some(json!({ "name": name })) }
    }

    pub fn show_automation_editor(config: Value) -> Self {
        Self { kind: CommandKind::ShowAutomationEditor, payload: Some(json!({ "config": config })) }
    }

    pub fn into_outbound(self, id: i64) -> OutboundMessage {
        OutboundMessage::Command { id, command: self.kind.as_str().to_string(), payload: self.payload }
    }
}

/// Script that hands `json` to the page's `externalBus` entry point.
pub fn external_bus_script(json: &str) -> String {
    format!("window.externalBus({json});")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
