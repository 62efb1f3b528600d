//! Background checker: the in-process fallback trigger path.
//!
//! OS-scheduled notifications can be delayed or dropped while the process
//! is backgrounded, so a periodic poll loop (default 30 s) independently
//! re-evaluates all enabled alarms against wall-clock time and fires any
//! that are due. De-duplication against the notification path happens in
//! the alarm manager's trigger registry.
//!
//! The checker also owns the keep-alive policy: while the process is
//! suspended and an enabled alarm is pending, the keep-alive activity runs;
//! once an alarm is actively playing, playback itself keeps the process
//! alive and the keep-alive is stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::keepalive::BackgroundKeepAlive;
use crate::manager::AlarmManager;
use crate::schedule::evaluate;

/// Periodic poll loop evaluating alarms and driving the keep-alive.
pub struct BackgroundChecker {
    manager: Arc<AlarmManager>,
    keepalive: Arc<dyn BackgroundKeepAlive>,
    poll_interval: Duration,
    // Daemons run unattached, so assume "backgrounded" until a host says
    // otherwise via on_foreground.
    suspended: AtomicBool,
}

impl BackgroundChecker {
    /// Creates a checker with the given poll interval.
    #[must_use]
    pub fn new(
        manager: Arc<AlarmManager>,
        keepalive: Arc<dyn BackgroundKeepAlive>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            manager,
            keepalive,
            poll_interval,
            suspended: AtomicBool::new(true),
        }
    }

    /// Runs the poll loop. Should be spawned as a separate tokio task.
    pub async fn run(&self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.pass(Local::now()).await;
        }
    }

    /// One evaluation pass at the given instant.
    ///
    /// Skips alarm evaluation entirely while an alarm is already ringing.
    /// At most one alarm fires per pass even if several are simultaneously
    /// due; the rest are deferred to the next pass, because only one audio
    /// source may play at a time.
    pub async fn pass(&self, now: DateTime<Local>) {
        self.update_keepalive().await;

        if self.manager.is_triggered() {
            return;
        }

        let alarms = match self.manager.store().list() {
            Ok(alarms) => alarms,
            Err(e) => {
                warn!("Checker could not load alarms: {}", e);
                return;
            }
        };

        for alarm in &alarms {
            if !alarm.enabled {
                continue;
            }
            if evaluate(alarm, now).is_none() {
                continue;
            }

            debug!("Checker found alarm {} due", alarm.id);
            // One alarm's failure must never abort the loop or the
            // manager's ability to handle the next event.
            if let Err(e) = self.manager.on_alarm_due(&alarm.id, now).await {
                warn!("Error triggering alarm {}: {}", alarm.id, e);
            }
            break;
        }
    }

    /// Notifies the checker that the host process was backgrounded.
    pub async fn on_background(&self) {
        self.suspended.store(true, Ordering::SeqCst);
        self.update_keepalive().await;
    }

    /// Notifies the checker that the host process returned to foreground.
    pub async fn on_foreground(&self) {
        self.suspended.store(false, Ordering::SeqCst);
        if self.keepalive.is_active() {
            self.keepalive.stop().await;
        }
    }

    /// Reconciles the keep-alive activity with the desired state:
    /// running exactly when the process is suspended, no alarm is ringing,
    /// and at least one enabled alarm is pending.
    async fn update_keepalive(&self) {
        if self.manager.is_triggered() {
            // Playback itself keeps the process alive.
            if self.keepalive.is_active() {
                self.keepalive.stop().await;
            }
            return;
        }

        if !self.suspended.load(Ordering::SeqCst) {
            return;
        }

        let any_enabled = self
            .manager
            .store()
            .list()
            .map(|alarms| alarms.iter().any(|a| a.enabled))
            .unwrap_or(false);

        if any_enabled && !self.keepalive.is_active() {
            if let Err(e) = self.keepalive.start().await {
                warn!("Keep-alive could not start: {}", e);
            }
        } else if !any_enabled && self.keepalive.is_active() {
            self.keepalive.stop().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
