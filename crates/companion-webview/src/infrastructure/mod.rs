//! Infrastructure layer for companion-webview.
//!
//! Everything that touches the outside world lives here: the event loop that
//! drives a session from platform callbacks, the TOML settings file, and the
//! recording collaborators used by tests and the diagnostic binary.
//!
//! # What does NOT belong here?
//!
//! - Navigation or dispatch decisions (that is the application layer)
//! - Wire types (those are in `companion-core`)

pub mod mock;
pub mod session_actor;
pub mod settings_store;

pub use session_actor::{spawn_session, SessionEvent, SessionHandle, SessionSummary};
pub use settings_store::{load_settings, save_settings, ConfigError, SessionSettings, SettingsFile};
