//! companion-webview library crate.
//!
//! Hosts the remote home-automation frontend inside an embedded content
//! runtime and bridges it to native capabilities.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Frontend page (window.externalBus / getExternalAuth)
//!         ↕
//! [companion-webview]
//!   ├── domain/           Pure types: SessionConfig, SessionState, navigation values
//!   ├── application/      Dispatcher, SessionController, reconnect timer, URL commands
//!   └── infrastructure/
//!         ├── session_actor/   tokio event loop owning one controller
//!         ├── settings_store/  TOML settings file
//!         └── mock/            recording collaborators
//!         ↕
//! [companion-core]  endpoint model, resolver, bridge wire types
//! ```
//!
//! # Layer rules
//!
//! - `domain` does no I/O and spawns nothing.
//! - `application` reaches the outside world only through the traits in
//!   `application::ports`.
//! - `infrastructure` depends on all other layers plus `tokio` and `toml`.
//!
//! # For beginners: why split out the ports?
//!
//! The real content runtime, token store and tag reader only exist on a
//! device.  Putting them behind traits lets every piece of session logic run
//! in a plain `cargo test` with recording doubles instead.

/// Domain layer: pure session types (no I/O).
pub mod domain;

/// Application layer: dispatch, navigation state machine, supervision.
pub mod application;

/// Infrastructure layer: session event loop and settings persistence.
pub mod infrastructure;
