//! Domain layer for companion-webview.
//!
//! Pure types with no dependencies on tokio, the content runtime, or the file
//! system.
//!
//! # What belongs in the domain layer?
//!
//! - Session configuration ([`SessionConfig`]) and host capabilities
//! - The navigation state machine's states ([`SessionState`]) and errors
//! - Values exchanged with the content runtime: navigation responses, load
//!   failures, authentication challenges, script messages
//!
//! # What does NOT belong here?
//!
//! - The state machine itself (that is `application::session`)
//! - Spawning tasks, timers, or channels
//! - Reading the settings file

pub mod config;
pub mod navigation;
pub mod session_state;

pub use config::{HostCapabilities, SessionConfig};
pub use navigation::{
    AuthChallenge, ChallengeDisposition, ChallengeMethod, ChallengeResponse, Credential, FailureReason,
    LinkTarget, LoadFailure, NavigationPolicy, NavigationResponse, ScriptMessage, SessionNotice,
};
pub use session_state::{SessionError, SessionState};
