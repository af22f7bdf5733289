//! Domain layer for companion-core.
//!
//! # What belongs here?
//!
//! - The endpoint model ([`EndpointKind`], [`ConnectionConfig`])
//! - The output of resolution ([`ResolvedConnection`])
//! - The live network signal and the port that produces it
//!
//! # What does NOT belong here?
//!
//! - Resolution logic (that is `crate::resolver`)
//! - Reading Wi-Fi state from the operating system (an external collaborator
//!   implements [`NetworkSignalSource`])
//! - Loading configuration from disk

pub mod endpoint;
pub mod signal;

pub use endpoint::{ActiveKind, ConnectionConfig, EndpointKind, ResolvedConnection};
pub use signal::{NetworkSignal, NetworkSignalSource};
