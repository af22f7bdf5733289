//! Application layer for companion-webview.
//!
//! The application layer orchestrates the session: it knows *what* to do with
//! a bridge message, a navigation response or a background transition, but
//! delegates *how* (rendering, tokens, hardware) to injected collaborator
//! ports.
//!
//! # Responsibilities
//!
//! - Routing external-bus messages to handlers and correlating results
//! - The navigation state machine ([`SessionController`])
//! - Restart supervision while the app is backgrounded
//! - Answering the page's external-auth requests
//! - Executing URL-scheme commands
//!
//! # What does NOT belong here?
//!
//! - Driving the session from an event loop (that is
//!   `infrastructure::session_actor`)
//! - Reading or writing the settings file
//! - Any concrete platform implementation of the ports

pub mod dispatcher;
pub mod external_auth;
pub mod handlers;
pub mod ports;
pub mod reconnect;
pub mod session;
pub mod url_command;

pub use dispatcher::{AsyncHandler, BridgeDispatcher, DispatchOutcome, Handler, HandlerError, HandlerResult, Outbound};
pub use external_auth::ExternalAuthBridge;
pub use handlers::{register_builtin_handlers, BuiltinHandlers};
pub use ports::{
    AccessToken, ConnectionEvent, ConnectionStatusSink, ContentRuntime, HapticFeedback, HapticKind, HubApi,
    ScriptError, SessionUi, TagReader, TokenProvider, TrustEvaluator,
};
pub use reconnect::ReconnectSupervisor;
pub use session::{SessionCollaborators, SessionController};
pub use url_command::{UrlCommand, UrlCommandError, UrlCommandHandler, UrlCommandOutcome};
