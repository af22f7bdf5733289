//! # companion-core
//!
//! Shared library for the companion web bridge containing the endpoint model,
//! the connection resolver, and the typed external-bus wire format.
//!
//! This crate has zero dependencies on async runtimes, content runtimes, or
//! network sockets.  Everything in it is a pure function of its inputs.
//!
//! # Architecture overview (for beginners)
//!
//! The companion app embeds a remote smart-home dashboard (the "hub") inside a
//! native web view.  The same hub can usually be reached over several network
//! paths: directly on the home network, over the public internet, or through a
//! cloud relay.  This crate decides *which* path to use and defines the JSON
//! messages the embedded page and the native host exchange.
//!
//! - **`domain`** – The endpoint model: which URLs are configured, which Wi-Fi
//!   networks count as "home", and what the network currently looks like.
//!
//! - **`resolver`** – A pure function that turns configuration plus the current
//!   network signal into a [`ResolvedConnection`]: the active base URL and the
//!   API and webhook URLs derived from it.
//!
//! - **`protocol`** – The external-bus wire format.  The embedded page posts
//!   `{"type", "id"?, "payload"?}` objects; the host answers with
//!   `{"id", "type": "result", "result"}` by calling `window.externalBus(json)`.

pub mod domain;
pub mod protocol;
pub mod resolver;

// Re-export the most-used types at the crate root so callers can write
// `companion_core::ConnectionConfig` instead of the full module path.
pub use domain::endpoint::{ActiveKind, ConnectionConfig, EndpointKind, ResolvedConnection};
pub use domain::signal::{NetworkSignal, NetworkSignalSource};
pub use protocol::messages::{BridgeMessage, MalformedBridgeMessage, MessageKind};
pub use protocol::outbound::{BridgeResponse, CommandKind, OutboundMessage, OutgoingCommand};
pub use resolver::{api_url, resolve, webhook_url, FALLBACK_URL};
