//! Alarm manager: the root orchestrator of the engine.
//!
//! Owns the single "active alarm" and "preview" audio-source slots and is
//! the only component allowed to start or stop alarm audio. Both trigger
//! paths (OS notification delivery and the background checker) funnel into
//! [`AlarmManager::on_alarm_due`], where the trigger registry accepts the
//! first signal and suppresses the second.
//!
//! State machine: `Idle` → `Triggered` (audio playing, "now playing" notice
//! shown) → `Snoozed` (audio stopped, re-fire scheduled) → back to `Idle`
//! via stop, or back to `Triggered` when the snooze deadline fires.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Local, Timelike};
use tracing::{debug, error, warn};

use crate::notify::{AlarmNotifier, NotificationPayload};
use crate::schedule::next_occurrence;
use crate::source::{AlarmAudioSource, AudioSourceFactory};
use crate::store::AlarmStore;
use crate::trigger::TriggerRegistry;
use crate::types::{Alarm, PreviewParams};

// ============================================================================
// ManagerState
// ============================================================================

/// The manager's alarm lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerState {
    /// No active alarm.
    Idle,
    /// An alarm fired and its audio source is playing.
    Triggered {
        /// The firing alarm's id.
        alarm_id: String,
        /// Display name of the playing source.
        source_name: String,
    },
    /// A triggered alarm was deferred; a re-fire is scheduled.
    Snoozed {
        /// The deferred alarm's id.
        alarm_id: String,
        /// The re-fire deadline.
        until: DateTime<Local>,
    },
}

impl ManagerState {
    /// Returns the string representation of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerState::Idle => "idle",
            ManagerState::Triggered { .. } => "triggered",
            ManagerState::Snoozed { .. } => "snoozed",
        }
    }
}

// ============================================================================
// AlarmManager
// ============================================================================

/// Orchestrates alarm CRUD, trigger handling, snooze, and the audio slots.
pub struct AlarmManager {
    store: AlarmStore,
    factory: AudioSourceFactory,
    notifier: Arc<dyn AlarmNotifier>,
    registry: Arc<TriggerRegistry>,
    active: tokio::sync::Mutex<Option<AlarmAudioSource>>,
    preview: tokio::sync::Mutex<Option<AlarmAudioSource>>,
    state: Mutex<ManagerState>,
}

impl AlarmManager {
    /// Creates a manager over the given collaborators.
    #[must_use]
    pub fn new(
        store: AlarmStore,
        factory: AudioSourceFactory,
        notifier: Arc<dyn AlarmNotifier>,
        registry: Arc<TriggerRegistry>,
    ) -> Self {
        Self {
            store,
            factory,
            notifier,
            registry,
            active: tokio::sync::Mutex::new(None),
            preview: tokio::sync::Mutex::new(None),
            state: Mutex::new(ManagerState::Idle),
        }
    }

    /// The underlying alarm store, for read paths (list/status).
    #[must_use]
    pub fn store(&self) -> &AlarmStore {
        &self.store
    }

    /// Returns a snapshot of the lifecycle state.
    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.state.lock().unwrap().clone()
    }

    /// Returns true while an alarm's audio source is playing.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        matches!(*self.state.lock().unwrap(), ManagerState::Triggered { .. })
    }

    /// Read-only peek at the active source name for presentation layers.
    /// Has no side effects.
    #[must_use]
    pub fn active_audio_source_name(&self) -> Option<String> {
        match &*self.state.lock().unwrap() {
            ManagerState::Triggered { source_name, .. } => Some(source_name.clone()),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // CRUD + notification side effects
    // ------------------------------------------------------------------------

    /// Persists a new alarm and schedules its trigger notification.
    pub async fn add_alarm(&self, alarm: Alarm) -> Result<()> {
        if let Err(message) = alarm.validate() {
            anyhow::bail!(message);
        }
        self.store.upsert(alarm.clone())?;
        self.reschedule_notification(&alarm).await;
        Ok(())
    }

    /// Persists changes to an alarm and re-schedules unconditionally
    /// (cancel-then-reschedule) so no stale trigger survives the update.
    pub async fn update_alarm(&self, alarm: Alarm) -> Result<()> {
        if let Err(message) = alarm.validate() {
            anyhow::bail!(message);
        }
        self.store.upsert(alarm.clone())?;
        self.reschedule_notification(&alarm).await;
        Ok(())
    }

    /// Deletes an alarm and cancels its scheduled notifications.
    pub async fn delete_alarm(&self, id: &str) -> Result<bool> {
        let removed = self.store.delete(id)?;
        self.notifier.cancel_for_alarm(id).await;
        Ok(removed)
    }

    /// Enables or disables an alarm. Disabling clears any pending snooze.
    pub async fn toggle_alarm(&self, id: &str, enabled: bool) -> Result<Alarm> {
        let Some(mut alarm) = self.store.get(id)? else {
            anyhow::bail!("アラームが見つかりません: {id}");
        };
        alarm.enabled = enabled;
        if !enabled {
            alarm.snooze_until = None;
        }
        self.store.upsert(alarm.clone())?;
        self.reschedule_notification(&alarm).await;
        Ok(alarm)
    }

    /// Cancels and re-creates the alarm's trigger notification to match
    /// its current schedule. Disabled alarms end up with no trigger.
    async fn reschedule_notification(&self, alarm: &Alarm) {
        self.notifier.cancel_for_alarm(&alarm.id).await;
        let Some(at) = next_occurrence(alarm, Local::now()) else {
            return;
        };
        let payload = if alarm.snooze_until.is_some() {
            NotificationPayload::snooze(&alarm.id)
        } else {
            NotificationPayload::new(&alarm.id)
        };
        if let Err(e) = self.notifier.schedule(at, payload).await {
            warn!("Failed to schedule trigger for alarm {}: {}", alarm.id, e);
        }
    }

    // ------------------------------------------------------------------------
    // Trigger handling
    // ------------------------------------------------------------------------

    /// Handles "this alarm is due" from either trigger path.
    ///
    /// No-op when an alarm is already ringing or when the de-duplication
    /// registry has already seen this `(alarm, minute)`. A source-start
    /// failure is logged and leaves the manager `Idle`; retries live inside
    /// the audio source, not here.
    pub async fn on_alarm_due(&self, alarm_id: &str, now: DateTime<Local>) -> Result<()> {
        if self.is_triggered() {
            debug!("Alarm {} due while another alarm rings; ignored", alarm_id);
            return Ok(());
        }

        let Some(mut alarm) = self.store.get(alarm_id)? else {
            warn!("Due signal for unknown alarm {}", alarm_id);
            return Ok(());
        };
        if !alarm.enabled {
            debug!("Due signal for disabled alarm {}; ignored", alarm_id);
            return Ok(());
        }

        if !self.registry.try_claim(alarm_id, now.hour(), now.minute()) {
            debug!(
                "Alarm {} already fired at {:02}:{:02}; duplicate suppressed",
                alarm_id,
                now.hour(),
                now.minute()
            );
            return Ok(());
        }

        // Firing consumes any pending snooze.
        if alarm.snooze_until.is_some() {
            alarm.snooze_until = None;
            self.store.upsert(alarm.clone())?;
        }

        let Some(source) = self.factory.create(&alarm) else {
            // Configuration error; the factory already warned.
            return Ok(());
        };

        // Alarm audio owns the device; a running preview yields.
        self.stop_preview().await;

        self.start_active(source, &alarm.id).await;
        Ok(())
    }

    /// Starts a source in the active slot. The previous occupant, if any,
    /// is stopped and released before the new source is assigned; on a
    /// start failure the slot is left empty so the "at most one active
    /// source" invariant holds on the exception path too.
    async fn start_active(&self, mut source: AlarmAudioSource, alarm_id: &str) {
        let mut slot = self.active.lock().await;
        if let Some(mut previous) = slot.take() {
            previous.stop().await;
            previous.cleanup();
        }

        let name = source.name().to_string();
        match source.play().await {
            Ok(()) => {
                *slot = Some(source);
                drop(slot);
                *self.state.lock().unwrap() = ManagerState::Triggered {
                    alarm_id: alarm_id.to_string(),
                    source_name: name.clone(),
                };
                self.notifier.show_now_playing(&name).await;
            }
            Err(e) => {
                source.cleanup();
                drop(slot);
                *self.state.lock().unwrap() = ManagerState::Idle;
                error!("Failed to start alarm audio '{}': {}", name, e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Stop / snooze
    // ------------------------------------------------------------------------

    /// Stops the active alarm and returns to `Idle`. Idempotent: calling
    /// with no active alarm is a no-op, never an error.
    ///
    /// Completing the fire-and-stop cycle of a one-shot alarm disables it;
    /// a repeating alarm keeps its schedule and gets its next trigger.
    pub async fn stop_alarm(&self) -> Result<()> {
        {
            let mut slot = self.active.lock().await;
            if let Some(mut source) = slot.take() {
                source.stop().await;
                source.cleanup();
            }
        }
        self.notifier.dismiss_now_playing().await;

        let prior = std::mem::replace(&mut *self.state.lock().unwrap(), ManagerState::Idle);
        let alarm_id = match prior {
            ManagerState::Triggered { alarm_id, .. } => alarm_id,
            ManagerState::Snoozed { alarm_id, .. } => alarm_id,
            ManagerState::Idle => return Ok(()),
        };

        if let Some(mut alarm) = self.store.get(&alarm_id)? {
            alarm.snooze_until = None;
            if alarm.is_one_shot() {
                alarm.enabled = false;
            }
            self.store.upsert(alarm.clone())?;
            self.reschedule_notification(&alarm).await;
        }
        Ok(())
    }

    /// Defers the ringing alarm by `minutes` (defaulting to the alarm's own
    /// snooze interval). Only valid while `Triggered`.
    ///
    /// A snoozed one-shot stays enabled; disabling happens only when a
    /// normal firing is stopped.
    pub async fn snooze_alarm(&self, minutes: Option<u32>, now: DateTime<Local>) -> Result<()> {
        let ManagerState::Triggered { alarm_id, .. } = self.state() else {
            anyhow::bail!("アラームは鳴っていません");
        };

        let Some(mut alarm) = self.store.get(&alarm_id)? else {
            anyhow::bail!("アラームが見つかりません: {alarm_id}");
        };
        if !alarm.snooze_enabled {
            anyhow::bail!("このアラームはスヌーズが無効です");
        }

        {
            let mut slot = self.active.lock().await;
            if let Some(mut source) = slot.take() {
                source.stop().await;
                source.cleanup();
            }
        }
        self.notifier.dismiss_now_playing().await;

        let interval = minutes.unwrap_or(alarm.snooze_interval_minutes).max(1);
        let until = now + chrono::Duration::minutes(i64::from(interval));
        alarm.snooze_until = Some(until);
        self.store.upsert(alarm.clone())?;
        self.reschedule_notification(&alarm).await;

        *self.state.lock().unwrap() = ManagerState::Snoozed {
            alarm_id: alarm.id.clone(),
            until,
        };
        debug!("Alarm {} snoozed until {}", alarm.id, until.format("%H:%M"));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Preview
    // ------------------------------------------------------------------------

    /// Starts preview playback of an ad-hoc source. The previous preview
    /// occupant, if any, is stopped first. Returns the source name.
    ///
    /// Preview is user-initiated, so start failures are surfaced rather
    /// than merely logged.
    pub async fn start_preview(&self, params: &PreviewParams) -> Result<String> {
        let Some(mut source) = self.factory.create_preview(params) else {
            anyhow::bail!("プレビューするソースが指定されていません");
        };

        let mut slot = self.preview.lock().await;
        if let Some(mut previous) = slot.take() {
            previous.stop().await;
            previous.cleanup();
        }

        let name = source.name().to_string();
        match source.play().await {
            Ok(()) => {
                *slot = Some(source);
                Ok(name)
            }
            Err(e) => {
                source.cleanup();
                anyhow::bail!("プレビューを開始できませんでした: {e}");
            }
        }
    }

    /// Stops preview playback. Idempotent.
    pub async fn stop_preview(&self) {
        let mut slot = self.preview.lock().await;
        if let Some(mut source) = slot.take() {
            source.stop().await;
            source.cleanup();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioSession, MockAudioSession};
    use crate::config::{EngineConfig, PlaylistRetryPolicy};
    use crate::notify::MockNotifier;
    use crate::service::{MockMusicServiceClient, MusicServiceClient};
    use crate::store::MemoryKvStore;
    use crate::types::{AlarmTime, PlaylistSpec, StreamSpec};
    use chrono::TimeZone;

    struct Fixture {
        manager: AlarmManager,
        session: Arc<MockAudioSession>,
        music: Arc<MockMusicServiceClient>,
        notifier: Arc<MockNotifier>,
    }

    fn fixture() -> Fixture {
        let session = Arc::new(MockAudioSession::new());
        let music = Arc::new(MockMusicServiceClient::new());
        let (notifier, _rx) = MockNotifier::new();
        let notifier = Arc::new(notifier);

        let config = EngineConfig {
            stream_monitor_interval_secs: 60,
            playlist_retry: PlaylistRetryPolicy {
                max_attempts: 3,
                base_delay_ms: 1,
            },
            ..Default::default()
        };
        let factory = AudioSourceFactory::new(
            Arc::clone(&session) as Arc<dyn AudioSession>,
            Arc::clone(&music) as Arc<dyn MusicServiceClient>,
            config,
        );
        let store = AlarmStore::new(Arc::new(MemoryKvStore::new()));
        let manager = AlarmManager::new(
            store,
            factory,
            Arc::clone(&notifier) as Arc<dyn AlarmNotifier>,
            Arc::new(TriggerRegistry::new()),
        );

        Fixture {
            manager,
            session,
            music,
            notifier,
        }
    }

    fn stream_alarm(id: &str, hour: u32, minute: u32) -> Alarm {
        let mut alarm = Alarm::new(AlarmTime::new(hour, minute).unwrap());
        alarm.id = id.to_string();
        alarm.stream = Some(StreamSpec {
            url: "https://radio.example/live".to_string(),
            name: "Morning FM".to_string(),
        });
        alarm
    }

    fn playlist_alarm(id: &str) -> Alarm {
        let mut alarm = Alarm::new(AlarmTime::new(6, 30).unwrap());
        alarm.id = id.to_string();
        alarm.playlist = Some(PlaylistSpec {
            uri: "service:playlist:abc".to_string(),
            name: "Wake Up Mix".to_string(),
        });
        alarm
    }

    fn at(hour: u32, minute: u32) -> DateTime<Local> {
        // 2024-01-07 was a Sunday.
        Local.with_ymd_and_hms(2024, 1, 7, hour, minute, 5).unwrap()
    }

    // ------------------------------------------------------------------------
    // CRUD Tests
    // ------------------------------------------------------------------------

    mod crud_tests {
        use super::*;

        #[tokio::test]
        async fn test_add_persists_and_schedules() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 6, 30)).await.unwrap();

            assert_eq!(f.manager.store().list().unwrap().len(), 1);
            assert_eq!(f.notifier.scheduled_count(), 1);
        }

        #[tokio::test]
        async fn test_add_invalid_alarm_rejected() {
            let f = fixture();
            // Enabled but without a sound source.
            let alarm = Alarm::new(AlarmTime::new(6, 30).unwrap());

            let result = f.manager.add_alarm(alarm).await;
            assert!(result.is_err());
            assert!(f.manager.store().list().unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_update_reschedules_unconditionally() {
            let f = fixture();
            let mut alarm = stream_alarm("a1", 6, 30);
            f.manager.add_alarm(alarm.clone()).await.unwrap();

            alarm.time = AlarmTime::new(7, 0).unwrap();
            f.manager.update_alarm(alarm).await.unwrap();

            // Still exactly one live trigger, and at least one cancel issued.
            assert_eq!(f.notifier.scheduled_count(), 1);
            assert!(f.notifier.cancel_count() >= 1);
        }

        #[tokio::test]
        async fn test_toggle_disable_cancels_trigger() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 6, 30)).await.unwrap();

            let alarm = f.manager.toggle_alarm("a1", false).await.unwrap();
            assert!(!alarm.enabled);
            assert_eq!(f.notifier.scheduled_count(), 0);
        }

        #[tokio::test]
        async fn test_toggle_disable_clears_snooze() {
            let f = fixture();
            let mut alarm = stream_alarm("a1", 6, 30);
            alarm.snooze_until = Some(at(6, 35));
            f.manager.add_alarm(alarm).await.unwrap();

            let alarm = f.manager.toggle_alarm("a1", false).await.unwrap();
            assert!(alarm.snooze_until.is_none());
        }

        #[tokio::test]
        async fn test_toggle_unknown_id_errors() {
            let f = fixture();
            assert!(f.manager.toggle_alarm("nope", true).await.is_err());
        }

        #[tokio::test]
        async fn test_delete_cancels_trigger() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 6, 30)).await.unwrap();

            assert!(f.manager.delete_alarm("a1").await.unwrap());
            assert!(!f.manager.delete_alarm("a1").await.unwrap());
            assert_eq!(f.notifier.scheduled_count(), 0);
        }
    }

    // ------------------------------------------------------------------------
    // Trigger Tests
    // ------------------------------------------------------------------------

    mod trigger_tests {
        use super::*;

        #[tokio::test]
        async fn test_on_alarm_due_starts_audio() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 6, 30)).await.unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();

            assert!(f.manager.is_triggered());
            assert_eq!(f.session.call_count("play"), 1);
            assert_eq!(
                f.manager.active_audio_source_name().as_deref(),
                Some("Morning FM")
            );
            assert_eq!(f.notifier.now_playing().as_deref(), Some("Morning FM"));
        }

        #[tokio::test]
        async fn test_duplicate_due_signals_fire_once() {
            let f = fixture();
            let mut alarm = stream_alarm("a1", 6, 30);
            alarm.repeat_days.extend(0..=6);
            f.manager.add_alarm(alarm).await.unwrap();

            // Notification path and checker path race within the minute;
            // even with the first firing already stopped by the user, the
            // registry suppresses the late duplicate.
            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();
            f.manager.stop_alarm().await.unwrap();
            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();

            assert_eq!(f.session.call_count("play"), 1, "exactly one play");
        }

        #[tokio::test]
        async fn test_due_while_triggered_is_ignored() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 6, 30)).await.unwrap();
            f.manager.add_alarm(stream_alarm("a2", 6, 30)).await.unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();
            f.manager.on_alarm_due("a2", at(6, 30)).await.unwrap();

            assert_eq!(f.session.call_count("play"), 1);
            assert_eq!(
                f.manager.state(),
                ManagerState::Triggered {
                    alarm_id: "a1".to_string(),
                    source_name: "Morning FM".to_string(),
                }
            );
        }

        #[tokio::test]
        async fn test_due_for_unknown_alarm_is_noop() {
            let f = fixture();
            f.manager.on_alarm_due("ghost", at(6, 30)).await.unwrap();
            assert!(!f.manager.is_triggered());
        }

        #[tokio::test]
        async fn test_due_for_disabled_alarm_is_skipped() {
            let f = fixture();
            let mut alarm = stream_alarm("a1", 6, 30);
            alarm.enabled = false;
            f.manager.store().upsert(alarm).unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();
            assert_eq!(f.session.call_count("play"), 0);
        }

        #[tokio::test]
        async fn test_due_without_sound_source_is_skipped() {
            let f = fixture();
            let mut alarm = Alarm::new(AlarmTime::new(6, 30).unwrap());
            alarm.id = "a1".to_string();
            // Bypasses validation: simulates a legacy/corrupt record.
            f.manager.store().upsert(alarm).unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();
            assert!(!f.manager.is_triggered());
        }

        #[tokio::test]
        async fn test_source_start_failure_leaves_idle() {
            let f = fixture();
            f.session.set_fail_load(true);
            f.manager.add_alarm(stream_alarm("a1", 6, 30)).await.unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();

            assert_eq!(f.manager.state(), ManagerState::Idle);
            assert!(f.manager.active_audio_source_name().is_none());
            assert!(f.notifier.now_playing().is_none());
        }

        #[tokio::test]
        async fn test_firing_clears_pending_snooze() {
            let f = fixture();
            let mut alarm = stream_alarm("a1", 6, 30);
            alarm.snooze_until = Some(at(6, 30));
            f.manager.store().upsert(alarm).unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();

            let stored = f.manager.store().get("a1").unwrap().unwrap();
            assert!(stored.snooze_until.is_none());
        }

        #[tokio::test]
        async fn test_firing_stops_running_preview() {
            let f = fixture();
            f.manager.add_alarm(playlist_alarm("a1")).await.unwrap();

            let params = PreviewParams {
                stream_url: Some("https://radio.example/live".to_string()),
                stream_name: Some("Morning FM".to_string()),
                ..Default::default()
            };
            f.manager.start_preview(&params).await.unwrap();
            let stops_before = f.session.call_count("stop");

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();

            assert!(f.session.call_count("stop") > stops_before);
            assert!(f.manager.is_triggered());
        }
    }

    // ------------------------------------------------------------------------
    // Stop / snooze Tests
    // ------------------------------------------------------------------------

    mod stop_snooze_tests {
        use super::*;

        #[tokio::test]
        async fn test_stop_is_idempotent() {
            let f = fixture();
            f.manager.stop_alarm().await.unwrap();
            f.manager.stop_alarm().await.unwrap();
            assert_eq!(f.manager.state(), ManagerState::Idle);
        }

        #[tokio::test]
        async fn test_one_shot_disabled_after_fire_and_stop() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 6, 30)).await.unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();
            // Still enabled while ringing.
            assert!(f.manager.store().get("a1").unwrap().unwrap().enabled);

            f.manager.stop_alarm().await.unwrap();

            let stored = f.manager.store().get("a1").unwrap().unwrap();
            assert!(!stored.enabled, "one-shot disabled after stop");
            assert_eq!(f.manager.state(), ManagerState::Idle);
            assert!(f.notifier.now_playing().is_none());
        }

        #[tokio::test]
        async fn test_repeating_alarm_survives_fire_and_stop() {
            let f = fixture();
            let mut alarm = stream_alarm("a1", 6, 30);
            alarm.repeat_days.extend([0, 1, 2, 3, 4, 5, 6]);
            f.manager.add_alarm(alarm.clone()).await.unwrap();

            f.manager.on_alarm_due("a1", at(6, 30)).await.unwrap();
            f.manager.stop_alarm().await.unwrap();

            let stored = f.manager.store().get("a1").unwrap().unwrap();
            assert!(stored.enabled);
            assert_eq!(stored.repeat_days, alarm.repeat_days);
            // Next trigger scheduled again.
            assert_eq!(f.notifier.scheduled_count(), 1);
        }

        #[tokio::test]
        async fn test_snooze_requires_triggered() {
            let f = fixture();
            assert!(f.manager.snooze_alarm(None, at(7, 0)).await.is_err());
        }

        #[tokio::test]
        async fn test_snooze_round_trip() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 7, 0)).await.unwrap();
            f.manager.on_alarm_due("a1", at(7, 0)).await.unwrap();

            f.manager.snooze_alarm(None, at(7, 0)).await.unwrap();

            let stored = f.manager.store().get("a1").unwrap().unwrap();
            let until = stored.snooze_until.unwrap();
            assert_eq!((until.hour(), until.minute()), (7, 5));

            // One-shot must stay enabled while snoozed.
            assert!(stored.enabled);
            assert!(matches!(
                f.manager.state(),
                ManagerState::Snoozed { .. }
            ));

            // The snooze re-fire trigger is scheduled with the snooze flag.
            let schedules = f.notifier.schedules();
            let last = schedules.last().unwrap();
            assert!(last.1.is_snooze);
        }

        #[tokio::test]
        async fn test_snooze_custom_minutes() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 7, 0)).await.unwrap();
            f.manager.on_alarm_due("a1", at(7, 0)).await.unwrap();

            f.manager.snooze_alarm(Some(10), at(7, 0)).await.unwrap();

            let stored = f.manager.store().get("a1").unwrap().unwrap();
            let until = stored.snooze_until.unwrap();
            assert_eq!((until.hour(), until.minute()), (7, 10));
        }

        #[tokio::test]
        async fn test_snooze_disabled_alarm_policy() {
            let f = fixture();
            let mut alarm = stream_alarm("a1", 7, 0);
            alarm.snooze_enabled = false;
            f.manager.add_alarm(alarm).await.unwrap();
            f.manager.on_alarm_due("a1", at(7, 0)).await.unwrap();

            assert!(f.manager.snooze_alarm(None, at(7, 0)).await.is_err());
        }

        #[tokio::test]
        async fn test_snooze_stops_audio() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 7, 0)).await.unwrap();
            f.manager.on_alarm_due("a1", at(7, 0)).await.unwrap();

            f.manager.snooze_alarm(None, at(7, 0)).await.unwrap();

            assert_eq!(f.session.call_count("stop"), 1);
            assert!(f.notifier.now_playing().is_none());
        }

        #[tokio::test]
        async fn test_snoozed_then_refire_then_stop_disables_one_shot() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 7, 0)).await.unwrap();
            f.manager.on_alarm_due("a1", at(7, 0)).await.unwrap();
            f.manager.snooze_alarm(None, at(7, 0)).await.unwrap();

            // Snooze deadline fires (new minute, so a fresh dedup claim).
            f.manager.on_alarm_due("a1", at(7, 5)).await.unwrap();
            assert!(f.manager.is_triggered());

            f.manager.stop_alarm().await.unwrap();
            let stored = f.manager.store().get("a1").unwrap().unwrap();
            assert!(!stored.enabled);
            assert!(stored.snooze_until.is_none());
        }

        #[tokio::test]
        async fn test_stop_while_snoozed_cancels_deferral() {
            let f = fixture();
            f.manager.add_alarm(stream_alarm("a1", 7, 0)).await.unwrap();
            f.manager.on_alarm_due("a1", at(7, 0)).await.unwrap();
            f.manager.snooze_alarm(None, at(7, 0)).await.unwrap();

            f.manager.stop_alarm().await.unwrap();

            let stored = f.manager.store().get("a1").unwrap().unwrap();
            assert!(stored.snooze_until.is_none());
            assert!(!stored.enabled, "completed one-shot cycle");
            assert_eq!(f.manager.state(), ManagerState::Idle);
        }
    }

    // ------------------------------------------------------------------------
    // Preview Tests
    // ------------------------------------------------------------------------

    mod preview_tests {
        use super::*;

        fn stream_params() -> PreviewParams {
            PreviewParams {
                stream_url: Some("https://radio.example/live".to_string()),
                stream_name: Some("Morning FM".to_string()),
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn test_preview_plays_and_stops() {
            let f = fixture();
            let name = f.manager.start_preview(&stream_params()).await.unwrap();
            assert_eq!(name, "Morning FM");
            assert_eq!(f.session.call_count("play"), 1);

            f.manager.stop_preview().await;
            assert_eq!(f.session.call_count("stop"), 1);
        }

        #[tokio::test]
        async fn test_preview_slot_exclusivity() {
            let f = fixture();
            f.manager.start_preview(&stream_params()).await.unwrap();

            // Second preview: previous occupant stopped exactly once before
            // the new source plays.
            f.manager.start_preview(&stream_params()).await.unwrap();

            let calls = f.session.calls();
            let stop_index = calls.iter().position(|c| c == "stop").unwrap();
            let second_play = calls.iter().rposition(|c| c == "play").unwrap();
            assert_eq!(f.session.call_count("stop"), 1);
            assert!(stop_index < second_play, "stop precedes second play");
        }

        #[tokio::test]
        async fn test_preview_playlist_precedence() {
            let f = fixture();
            let params = PreviewParams {
                stream_url: Some("https://radio.example/live".to_string()),
                playlist_uri: Some("service:playlist:abc".to_string()),
                playlist_name: Some("Wake Up Mix".to_string()),
                ..Default::default()
            };

            let name = f.manager.start_preview(&params).await.unwrap();
            assert_eq!(name, "Wake Up Mix");
            assert_eq!(f.music.start_calls().len(), 1);
            assert_eq!(f.session.call_count("play"), 0);
        }

        #[tokio::test]
        async fn test_preview_without_params_errors() {
            let f = fixture();
            assert!(f
                .manager
                .start_preview(&PreviewParams::default())
                .await
                .is_err());
        }

        #[tokio::test]
        async fn test_preview_failure_surfaces_and_clears_slot() {
            let f = fixture();
            f.session.set_fail_load(true);

            assert!(f.manager.start_preview(&stream_params()).await.is_err());

            // Slot stays empty: stopping is a quiet no-op.
            f.manager.stop_preview().await;
        }

        #[tokio::test]
        async fn test_stop_preview_idempotent() {
            let f = fixture();
            f.manager.stop_preview().await;
            f.manager.stop_preview().await;
        }
    }
}
