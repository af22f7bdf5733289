//! External-bus wire format.
//!
//! The embedded page and the native host talk over a single script channel.
//!
//! ```text
//! page → host   {"type": "tag/read", "id": 7, "payload": {...}}   BridgeMessage
//! host → page   {"id": 7, "type": "result", "result": {...}}      BridgeResponse
//! host → page   {"id": 1, "type": "command", "command": "restart"} OutgoingCommand
//! ```
//!
//! Host → page traffic is delivered by evaluating
//! [`external_bus_script`] in the content runtime.

pub mod messages;
pub mod outbound;

pub use messages::{BridgeMessage, MalformedBridgeMessage, MessageKind};
pub use outbound::{external_bus_script, BridgeResponse, CommandKind, OutboundMessage, OutgoingCommand};
