//! Live network signal used to decide whether the internal endpoint applies.

use serde::{Deserialize, Serialize};

/// Snapshot of the current network environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSignal {
    /// Current Wi-Fi SSID, if connected to Wi-Fi.
    pub ssid: Option<String>,
    /// Hardware address of the current network (e.g. router BSSID or
    /// Ethernet gateway MAC).
    pub hardware_address: Option<String>,
}

impl NetworkSignal {
    pub fn new(ssid: Option<String>, hardware_address: Option<String>) -> Self {
        Self { ssid, hardware_address }
    }

    /// A signal with neither an SSID nor a hardware address.
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Read-only source of the current [`NetworkSignal`].
///
/// Implemented by the platform layer.  The session controller reads it on
/// every resolution.
#[cfg_attr(test, mockall::automock)]
pub trait NetworkSignalSource: Send + Sync {
    fn current_signal(&self) -> NetworkSignal;
}

/// A fixed signal, handy for diagnostics and tests.
impl NetworkSignalSource for NetworkSignal {
    fn current_signal(&self) -> NetworkSignal {
        self.clone()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
