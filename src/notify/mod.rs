//! Time-triggered notification subsystem.
//!
//! Wraps the platform's scheduled-notification facility behind the
//! [`AlarmNotifier`] capability: schedule/cancel time-triggered
//! notifications carrying an `{alarm_id, is_snooze}` payload, enumerate
//! what is scheduled, and deliver "fired" and "user responded" events to
//! the daemon loop. The default implementation ([`TokioNotifier`]) drives
//! triggers off the tokio timer wheel; a host with real OS notifications
//! supplies its own implementation of the same trait.
//!
//! The persistent "now playing" notice shown while an alarm rings is also
//! owned here.

mod error;

pub use error::NotifyError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

// ============================================================================
// Payload and events
// ============================================================================

/// Payload attached to a scheduled notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// The alarm this trigger belongs to.
    pub alarm_id: String,
    /// True when this trigger re-fires a snoozed alarm.
    pub is_snooze: bool,
}

impl NotificationPayload {
    /// Creates a regular (non-snooze) payload.
    #[must_use]
    pub fn new(alarm_id: impl Into<String>) -> Self {
        Self {
            alarm_id: alarm_id.into(),
            is_snooze: false,
        }
    }

    /// Creates a snooze re-fire payload.
    #[must_use]
    pub fn snooze(alarm_id: impl Into<String>) -> Self {
        Self {
            alarm_id: alarm_id.into(),
            is_snooze: true,
        }
    }
}

/// A user response to a delivered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserResponse {
    /// Stop the ringing alarm.
    Stop,
    /// Snooze the ringing alarm.
    Snooze,
}

/// Events delivered by the notification subsystem to the daemon loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierEvent {
    /// A scheduled trigger fired.
    Fired(NotificationPayload),
    /// The user responded to a delivered notification.
    Response {
        /// Payload of the notification responded to.
        payload: NotificationPayload,
        /// The chosen action.
        response: UserResponse,
    },
}

// ============================================================================
// AlarmNotifier
// ============================================================================

/// Capability interface over time-triggered notifications.
#[async_trait]
pub trait AlarmNotifier: Send + Sync {
    /// Schedules a trigger at the given instant; returns an opaque id.
    async fn schedule(
        &self,
        at: DateTime<Local>,
        payload: NotificationPayload,
    ) -> Result<String, NotifyError>;

    /// Cancels a scheduled trigger by id. Cancelling an unknown id is a
    /// no-op.
    async fn cancel(&self, id: &str);

    /// Cancels every scheduled trigger belonging to the given alarm.
    async fn cancel_for_alarm(&self, alarm_id: &str);

    /// Enumerates currently scheduled triggers.
    async fn scheduled(&self) -> Vec<(String, NotificationPayload)>;

    /// Shows the persistent "now playing" notice.
    async fn show_now_playing(&self, source_name: &str);

    /// Dismisses the persistent "now playing" notice.
    async fn dismiss_now_playing(&self);

    /// Returns the current "now playing" notice text, if shown.
    fn now_playing(&self) -> Option<String>;
}

// ============================================================================
// TokioNotifier
// ============================================================================

struct PendingTrigger {
    payload: NotificationPayload,
    // Assigned right after spawning; None only in the window where the
    // trigger is registered but its task handle is not yet recorded.
    task: Option<JoinHandle<()>>,
}

struct NotifierShared {
    pending: Mutex<HashMap<String, PendingTrigger>>,
    events: mpsc::UnboundedSender<NotifierEvent>,
    now_playing: Mutex<Option<String>>,
}

/// In-process notifier driving triggers off the tokio timer wheel.
pub struct TokioNotifier {
    shared: Arc<NotifierShared>,
}

impl TokioNotifier {
    /// Creates the notifier and the event receiver consumed by the daemon.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotifierEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                shared: Arc::new(NotifierShared {
                    pending: Mutex::new(HashMap::new()),
                    events: tx,
                    now_playing: Mutex::new(None),
                }),
            },
            rx,
        )
    }

    /// Delivers a user response for the currently shown notification.
    ///
    /// In-process stand-in for the platform's "user tapped an action"
    /// callback; the IPC layer calls this when the user runs `stop` or
    /// `snooze` from the CLI.
    pub fn deliver_response(&self, payload: NotificationPayload, response: UserResponse) {
        let _ = self
            .shared
            .events
            .send(NotifierEvent::Response { payload, response });
    }
}

#[async_trait]
impl AlarmNotifier for TokioNotifier {
    async fn schedule(
        &self,
        at: DateTime<Local>,
        payload: NotificationPayload,
    ) -> Result<String, NotifyError> {
        if self.shared.events.is_closed() {
            return Err(NotifyError::ChannelClosed);
        }

        let id = uuid::Uuid::new_v4().to_string();
        // A deadline in the past fires immediately.
        let delay = (at - Local::now()).to_std().unwrap_or_default();

        // Register before spawning so an immediately-elapsing trigger can
        // never observe a missing entry.
        self.shared
            .pending
            .lock()
            .unwrap()
            .insert(id.clone(), PendingTrigger { payload, task: None });

        let shared = Arc::clone(&self.shared);
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Remove ourselves first so a concurrent cancel cannot fire twice.
            let entry = shared.pending.lock().unwrap().remove(&task_id);
            if let Some(entry) = entry {
                debug!(
                    "Notification trigger fired for alarm {}",
                    entry.payload.alarm_id
                );
                let _ = shared.events.send(NotifierEvent::Fired(entry.payload));
            }
        });

        if let Some(entry) = self.shared.pending.lock().unwrap().get_mut(&id) {
            entry.task = Some(task);
        }

        Ok(id)
    }

    async fn cancel(&self, id: &str) {
        if let Some(entry) = self.shared.pending.lock().unwrap().remove(id) {
            if let Some(task) = entry.task {
                task.abort();
            }
            debug!("Cancelled notification {}", id);
        }
    }

    async fn cancel_for_alarm(&self, alarm_id: &str) {
        let mut pending = self.shared.pending.lock().unwrap();
        let ids: Vec<String> = pending
            .iter()
            .filter(|(_, p)| p.payload.alarm_id == alarm_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(entry) = pending.remove(&id) {
                if let Some(task) = entry.task {
                    task.abort();
                }
            }
        }
    }

    async fn scheduled(&self) -> Vec<(String, NotificationPayload)> {
        self.shared
            .pending
            .lock()
            .unwrap()
            .iter()
            .map(|(id, p)| (id.clone(), p.payload.clone()))
            .collect()
    }

    async fn show_now_playing(&self, source_name: &str) {
        info!("Now playing: {}", source_name);
        *self.shared.now_playing.lock().unwrap() = Some(source_name.to_string());
    }

    async fn dismiss_now_playing(&self) {
        *self.shared.now_playing.lock().unwrap() = None;
    }

    fn now_playing(&self) -> Option<String> {
        self.shared.now_playing.lock().unwrap().clone()
    }
}

// ============================================================================
// MockNotifier
// ============================================================================

/// Mock notifier for testing; records schedules and cancels without timers.
pub struct MockNotifier {
    scheduled: Mutex<Vec<(String, DateTime<Local>, NotificationPayload)>>,
    cancelled: Mutex<Vec<String>>,
    events: mpsc::UnboundedSender<NotifierEvent>,
    now_playing: Mutex<Option<String>>,
}

impl MockNotifier {
    /// Creates the mock and its event receiver.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NotifierEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                scheduled: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
                events: tx,
                now_playing: Mutex::new(None),
            },
            rx,
        )
    }

    /// Injects a fired event, as if a scheduled trigger elapsed.
    pub fn inject_fired(&self, payload: NotificationPayload) {
        let _ = self.events.send(NotifierEvent::Fired(payload));
    }

    /// Returns the deadlines and payloads scheduled so far.
    #[must_use]
    pub fn schedules(&self) -> Vec<(DateTime<Local>, NotificationPayload)> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(_, at, p)| (*at, p.clone()))
            .collect()
    }

    /// Returns how many triggers are currently scheduled (not cancelled).
    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    /// Returns how many cancels were issued.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancelled.lock().unwrap().len()
    }
}

#[async_trait]
impl AlarmNotifier for MockNotifier {
    async fn schedule(
        &self,
        at: DateTime<Local>,
        payload: NotificationPayload,
    ) -> Result<String, NotifyError> {
        let id = uuid::Uuid::new_v4().to_string();
        self.scheduled
            .lock()
            .unwrap()
            .push((id.clone(), at, payload));
        Ok(id)
    }

    async fn cancel(&self, id: &str) {
        self.scheduled.lock().unwrap().retain(|(i, _, _)| i != id);
        self.cancelled.lock().unwrap().push(id.to_string());
    }

    async fn cancel_for_alarm(&self, alarm_id: &str) {
        let mut scheduled = self.scheduled.lock().unwrap();
        let before = scheduled.len();
        scheduled.retain(|(_, _, p)| p.alarm_id != alarm_id);
        let removed = before - scheduled.len();
        drop(scheduled);
        for _ in 0..removed {
            self.cancelled.lock().unwrap().push(alarm_id.to_string());
        }
    }

    async fn scheduled(&self) -> Vec<(String, NotificationPayload)> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, p)| (id.clone(), p.clone()))
            .collect()
    }

    async fn show_now_playing(&self, source_name: &str) {
        *self.now_playing.lock().unwrap() = Some(source_name.to_string());
    }

    async fn dismiss_now_playing(&self) {
        *self.now_playing.lock().unwrap() = None;
    }

    fn now_playing(&self) -> Option<String> {
        self.now_playing.lock().unwrap().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
