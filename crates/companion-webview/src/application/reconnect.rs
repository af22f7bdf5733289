//! Reconnect supervisor.
//!
//! Some hub transports stall silently when the app is backgrounded.  While the
//! app stays in the background a repeating timer checks how long it has been
//! away; past the threshold it posts a `restart` command so the frontend
//! rebuilds its live-data connection before the user comes back.
//!
//! At most one timer exists.  It is aborted on foreground and on every
//! transition to `loaded`, and only re-created on background entry.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use companion_core::OutgoingCommand;

use super::dispatcher::Outbound;

pub struct ReconnectSupervisor {
    session_id: Uuid,
    check_interval: Duration,
    threshold: Duration,
    timer: Option<JoinHandle<()>>,
}

impl ReconnectSupervisor {
    pub fn new(session_id: Uuid, check_interval: Duration, threshold: Duration) -> Self {
        Self { session_id, check_interval, threshold, timer: None }
    }

    /// Starts the timer for a background period beginning now.
    ///
    /// Replaces any running timer.  Returns `false` when no tokio runtime is
    /// available.
    pub fn schedule(&mut self, outbox: mpsc::UnboundedSender<Outbound>) -> bool {
        self.cancel();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("session {}: cannot schedule reconnect timer without a runtime", self.session_id);
            return false;
        };

        let session_id = self.session_id;
        let period = self.check_interval.max(Duration::from_millis(1));
        let threshold = self.threshold;
        let background_since = Instant::now();

        debug!(
            "session {}: reconnect timer scheduled (every {:?}, threshold {:?})",
            session_id, period, threshold
        );

        self.timer = Some(runtime.spawn(async move {
            let mut ticker = interval_at(background_since + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let away = background_since.elapsed();
                if away > threshold {
                    info!(
                        "session {}: backgrounded for {:?}, asking frontend to restart its connection",
                        session_id, away
                    );
                    if outbox.send(Outbound::Command(OutgoingCommand::restart())).is_err() {
                        debug!("session {}: outbox closed, restart dropped", session_id);
                    }
                    break;
                }
            }
        }));
        true
    }

    /// Stops the timer, if any.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            if !timer.is_finished() {
                debug!("session {}: reconnect timer cancelled", self.session_id);
            }
            timer.abort();
        }
    }

    /// `true` while a timer is waiting to fire.
    pub fn is_scheduled(&self) -> bool {
        self.timer.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl Drop for ReconnectSupervisor {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor() -> ReconnectSupervisor {
        ReconnectSupervisor::new(Uuid::new_v4(), Duration::from_secs(5), Duration::from_secs(30))
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_sent_after_threshold() {
        // Arrange
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sup = supervisor();

        // Act
        assert!(sup.schedule(tx.clone()));
        let start = Instant::now();
        let received = tokio::time::timeout(Duration::from_secs(120), rx.recv()).await;

        // Assert
        assert_eq!(received.expect("fires before timeout"), Some(Outbound::Command(OutgoingCommand::restart())));
        let waited = start.elapsed();
        assert!(waited > Duration::from_secs(30) && waited <= Duration::from_secs(35), "fired after {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_sent_only_once_per_background_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sup = supervisor();
        sup.schedule(tx.clone());

        let first = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
        let second = tokio::time::timeout(Duration::from_secs(300), rx.recv()).await;

        assert!(matches!(first, Ok(Some(_))));
        assert!(second.is_err(), "no second restart");
        assert!(!sup.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_finishes_when_outbox_is_closed() {
        // Arrange
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sup = supervisor();
        drop(rx);

        // Act
        assert!(sup.schedule(tx));
        tokio::time::sleep(Duration::from_secs(40)).await;
        tokio::task::yield_now().await;

        // Assert
        assert!(!sup.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_threshold_sends_nothing() {
        // Arrange
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sup = supervisor();
        sup.schedule(tx.clone());

        // Act
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(sup.is_scheduled());
        sup.cancel();
        let received = tokio::time::timeout(Duration::from_secs(120), rx.recv()).await;

        // Assert
        assert!(received.is_err(), "timer must not fire after cancel");
        assert!(!sup.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_previous_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sup = supervisor();

        sup.schedule(tx.clone());
        tokio::time::sleep(Duration::from_secs(25)).await;
        sup.schedule(tx.clone());
        let start = Instant::now();
        let first = tokio::time::timeout(Duration::from_secs(120), rx.recv()).await;
        let second = tokio::time::timeout(Duration::from_secs(120), rx.recv()).await;

        assert!(matches!(first, Ok(Some(_))));
        assert!(start.elapsed() > Duration::from_secs(30), "only the new timer fired");
        assert!(second.is_err());
    }

    #[test]
    fn test_schedule_without_runtime_returns_false() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut sup = supervisor();
        assert!(!sup.schedule(tx));
        assert!(!sup.is_scheduled());
    }
}
