//! Audio sources and their factory.
//!
//! An audio source is a unit of playable audio with a
//! construct → `play` → (monitoring) → `stop` → `cleanup` lifecycle. The
//! closed set of kinds:
//!
//! - [`StreamSource`] — radio-style continuous URL through the shared
//!   audio session, with a stall-recovery monitor
//! - [`PlaylistSource`] — playlist on the external music service, with
//!   bounded start retries
//!
//! Sources are ephemeral and owned by whichever manager slot holds them;
//! they are never shared. New kinds are added by extending
//! [`AlarmAudioSource`], not by runtime type inspection.

mod error;
mod playlist;
mod stream;

pub use error::SourceError;
pub use playlist::PlaylistSource;
pub use stream::StreamSource;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::audio::AudioSession;
use crate::config::EngineConfig;
use crate::service::MusicServiceClient;
use crate::types::{Alarm, PreviewParams};

/// Stops and unloads the session, treating "already stopped / not loaded"
/// as success while still logging genuinely unexpected errors.
pub(crate) async fn best_effort_stop(session: &dyn AudioSession) {
    match session.stop().await {
        Ok(()) => {}
        Err(e) if e.is_expected_on_stop() => debug!("Stop on idle session: {}", e),
        Err(e) => warn!("Unexpected error stopping playback: {}", e),
    }
    match session.unload().await {
        Ok(()) => {}
        Err(e) if e.is_expected_on_stop() => {}
        Err(e) => warn!("Unexpected error unloading stream: {}", e),
    }
}

// ============================================================================
// AlarmAudioSource
// ============================================================================

/// The closed set of audio source kinds behind one capability surface.
pub enum AlarmAudioSource {
    /// Radio-style continuous stream.
    Stream(StreamSource),
    /// External music-service playlist.
    Playlist(PlaylistSource),
}

impl AlarmAudioSource {
    /// Human-readable source name, used to cross-reference "what is
    /// currently playing" without holding a live alarm reference.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Stream(source) => source.name(),
            Self::Playlist(source) => source.name(),
        }
    }

    /// Starts playback.
    pub async fn play(&mut self) -> Result<(), SourceError> {
        match self {
            Self::Stream(source) => source.play().await,
            Self::Playlist(source) => source.play().await,
        }
    }

    /// Stops playback. Never fails; teardown errors are logged or treated
    /// as already stopped inside the source.
    pub async fn stop(&mut self) {
        match self {
            Self::Stream(source) => source.stop().await,
            Self::Playlist(source) => source.stop().await,
        }
    }

    /// Releases timers and monitoring. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        match self {
            Self::Stream(source) => source.cleanup(),
            Self::Playlist(source) => source.cleanup(),
        }
    }
}

// ============================================================================
// AudioSourceFactory
// ============================================================================

/// Selects and constructs the concrete audio source for an alarm record.
pub struct AudioSourceFactory {
    session: Arc<dyn AudioSession>,
    music: Arc<dyn MusicServiceClient>,
    config: EngineConfig,
}

impl AudioSourceFactory {
    /// Creates a factory over the shared capabilities.
    #[must_use]
    pub fn new(
        session: Arc<dyn AudioSession>,
        music: Arc<dyn MusicServiceClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            session,
            music,
            config,
        }
    }

    /// Creates the audio source for an alarm.
    ///
    /// Precedence: a playlist source when the alarm carries a playlist,
    /// else a stream source, else `None` with a warning — the defensive
    /// fallback for an enabled alarm with no sound source.
    #[must_use]
    pub fn create(&self, alarm: &Alarm) -> Option<AlarmAudioSource> {
        if let Some(playlist) = &alarm.playlist {
            return Some(AlarmAudioSource::Playlist(PlaylistSource::new(
                &playlist.name,
                &playlist.uri,
                Arc::clone(&self.music),
                self.config.playlist_retry,
            )));
        }
        if let Some(stream) = &alarm.stream {
            return Some(AlarmAudioSource::Stream(StreamSource::new(
                &stream.name,
                &stream.url,
                Arc::clone(&self.session),
                self.config.stream_monitor_interval(),
            )));
        }
        warn!("Alarm {} has no sound source; skipping", alarm.id);
        None
    }

    /// Creates a preview source from ad-hoc parameters, with the same
    /// playlist-over-stream precedence.
    #[must_use]
    pub fn create_preview(&self, params: &PreviewParams) -> Option<AlarmAudioSource> {
        if let Some(uri) = &params.playlist_uri {
            let name = params.playlist_name.clone().unwrap_or_else(|| uri.clone());
            return Some(AlarmAudioSource::Playlist(PlaylistSource::new(
                name,
                uri,
                Arc::clone(&self.music),
                self.config.playlist_retry,
            )));
        }
        if let Some(url) = &params.stream_url {
            let name = params.stream_name.clone().unwrap_or_else(|| url.clone());
            return Some(AlarmAudioSource::Stream(StreamSource::new(
                name,
                url,
                Arc::clone(&self.session),
                self.config.stream_monitor_interval(),
            )));
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
