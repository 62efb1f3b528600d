//! Shared audio session capability.
//!
//! The engine never decodes audio itself; it drives a session capability
//! with load/play/stop/unload/status operations. The real implementation
//! ([`StreamAudioSession`]) owns the output device on a dedicated worker
//! thread; tests use [`MockAudioSession`].
//!
//! The session is a single shared device resource. Mutual exclusion between
//! logical sources is enforced by the alarm manager's slots, not here.

mod error;
mod session;

pub use error::AudioError;
pub use session::StreamAudioSession;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

// ============================================================================
// PlaybackStatus
// ============================================================================

/// Snapshot of the session's playback state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
    /// A stream is loaded into the session.
    pub is_loaded: bool,
    /// The loaded stream is audibly playing.
    pub is_playing: bool,
}

impl PlaybackStatus {
    /// Status of an empty session.
    #[must_use]
    pub fn unloaded() -> Self {
        Self::default()
    }

    /// Status of a loaded, playing session.
    #[must_use]
    pub fn playing() -> Self {
        Self {
            is_loaded: true,
            is_playing: true,
        }
    }

    /// Status of a loaded but silent session.
    #[must_use]
    pub fn paused() -> Self {
        Self {
            is_loaded: true,
            is_playing: false,
        }
    }
}

// ============================================================================
// AudioSession
// ============================================================================

/// Capability interface over the device audio session.
///
/// All operations are asynchronous and non-blocking to the caller; the
/// implementation must never hold the caller hostage to device latency.
#[async_trait]
pub trait AudioSession: Send + Sync {
    /// Sets the background-playback permission flag. Must be enabled before
    /// any alarm audio starts.
    async fn set_background_playback(&self, enabled: bool) -> Result<(), AudioError>;

    /// Opens the stream URL and loads it into the session, replacing any
    /// previously loaded stream. The session starts paused.
    async fn load(&self, url: &str) -> Result<(), AudioError>;

    /// Starts or resumes playback of the loaded stream.
    async fn play(&self) -> Result<(), AudioError>;

    /// Pauses playback. Returns [`AudioError::NotLoaded`] when nothing is
    /// loaded, which teardown paths treat as success.
    async fn stop(&self) -> Result<(), AudioError>;

    /// Unloads the stream and releases the decoder.
    async fn unload(&self) -> Result<(), AudioError>;

    /// Reports the current playback status.
    async fn status(&self) -> PlaybackStatus;
}

// ============================================================================
// UnavailableAudioSession
// ============================================================================

/// Fallback session used when no audio device could be initialized.
///
/// Every operation fails with [`AudioError::DeviceNotAvailable`] so sources
/// log failures instead of the daemon refusing to start.
#[derive(Debug, Default)]
pub struct UnavailableAudioSession;

impl UnavailableAudioSession {
    fn unavailable() -> AudioError {
        AudioError::DeviceNotAvailable("初期化に失敗しました".to_string())
    }
}

#[async_trait]
impl AudioSession for UnavailableAudioSession {
    async fn set_background_playback(&self, _enabled: bool) -> Result<(), AudioError> {
        Err(Self::unavailable())
    }

    async fn load(&self, _url: &str) -> Result<(), AudioError> {
        Err(Self::unavailable())
    }

    async fn play(&self) -> Result<(), AudioError> {
        Err(Self::unavailable())
    }

    async fn stop(&self) -> Result<(), AudioError> {
        Err(AudioError::NotLoaded)
    }

    async fn unload(&self) -> Result<(), AudioError> {
        Err(AudioError::NotLoaded)
    }

    async fn status(&self) -> PlaybackStatus {
        PlaybackStatus::unloaded()
    }
}

// ============================================================================
// MockAudioSession
// ============================================================================

/// Mock audio session for testing.
///
/// Records every call in order and lets tests control failure modes and
/// the reported status.
#[derive(Debug, Default)]
pub struct MockAudioSession {
    calls: Mutex<Vec<String>>,
    status: Mutex<PlaybackStatus>,
    fail_load: AtomicBool,
    fail_play: AtomicBool,
    background_enabled: AtomicBool,
}

impl MockAudioSession {
    /// Creates a mock session reporting an unloaded status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `load` calls fail.
    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `play` calls fail.
    pub fn set_fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    /// Overrides the reported status (e.g. to simulate a silently stalled
    /// stream for monitor tests).
    pub fn set_status(&self, status: PlaybackStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Returns the recorded calls in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Returns how many times the given call was recorded.
    #[must_use]
    pub fn call_count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == name || c.starts_with(&format!("{name}:")))
            .count()
    }

    /// Returns true if background playback was enabled.
    #[must_use]
    pub fn background_enabled(&self) -> bool {
        self.background_enabled.load(Ordering::SeqCst)
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl AudioSession for MockAudioSession {
    async fn set_background_playback(&self, enabled: bool) -> Result<(), AudioError> {
        self.record(format!("background:{enabled}"));
        self.background_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, url: &str) -> Result<(), AudioError> {
        self.record(format!("load:{url}"));
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(AudioError::StreamOpen("mock failure".to_string()));
        }
        *self.status.lock().unwrap() = PlaybackStatus::paused();
        Ok(())
    }

    async fn play(&self) -> Result<(), AudioError> {
        self.record("play");
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(AudioError::Playback("mock failure".to_string()));
        }
        let mut status = self.status.lock().unwrap();
        if !status.is_loaded {
            return Err(AudioError::NotLoaded);
        }
        status.is_playing = true;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AudioError> {
        self.record("stop");
        let mut status = self.status.lock().unwrap();
        if !status.is_loaded {
            return Err(AudioError::NotLoaded);
        }
        status.is_playing = false;
        Ok(())
    }

    async fn unload(&self) -> Result<(), AudioError> {
        self.record("unload");
        let mut status = self.status.lock().unwrap();
        if !status.is_loaded {
            return Err(AudioError::NotLoaded);
        }
        *status = PlaybackStatus::unloaded();
        Ok(())
    }

    async fn status(&self) -> PlaybackStatus {
        *self.status.lock().unwrap()
    }
}

// ============================================================================
// Tests
// ============================================================================
