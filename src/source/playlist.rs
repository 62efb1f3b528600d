//! Music-service playlist audio source.
//!
//! Delegates playback to the external music service. The remote player may
//! need time to wake, so start attempts retry with increasing backoff while
//! the service reports "device not ready"; exhausting the retry budget
//! surfaces a user-visible failure and leaves the source stopped.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::PlaylistRetryPolicy;
use crate::service::MusicServiceClient;

use super::error::SourceError;

/// A playlist source on the external music service.
pub struct PlaylistSource {
    name: String,
    uri: String,
    client: Arc<dyn MusicServiceClient>,
    retry: PlaylistRetryPolicy,
    started: bool,
}

impl PlaylistSource {
    /// Creates a playlist source; nothing plays until [`PlaylistSource::play`].
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        uri: impl Into<String>,
        client: Arc<dyn MusicServiceClient>,
        retry: PlaylistRetryPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            client,
            retry,
            started: false,
        }
    }

    /// Human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if playback was successfully started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Starts playback of the playlist URI, retrying while the remote
    /// player is not ready.
    pub async fn play(&mut self) -> Result<(), SourceError> {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.client.start_playback(None, &self.uri).await {
                Ok(()) => {
                    debug!("Playlist '{}' started (attempt {})", self.name, attempt);
                    self.started = true;
                    return Ok(());
                }
                Err(e) if e.is_device_not_ready() && attempt < max_attempts => {
                    warn!(
                        "Player not ready for '{}' (attempt {}/{}), retrying",
                        self.name, attempt, max_attempts
                    );
                    sleep(self.retry.delay_after(attempt)).await;
                }
                Err(e) if e.is_device_not_ready() => {
                    return Err(SourceError::PlaylistUnavailable {
                        name: self.name.clone(),
                        attempts: max_attempts,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(SourceError::PlaylistUnavailable {
            name: self.name.clone(),
            attempts: max_attempts,
        })
    }

    /// Best-effort pause. The pause endpoint is not always available
    /// depending on account and device state, so expected failures are
    /// treated as already stopped.
    pub async fn stop(&mut self) {
        match self.client.pause_playback().await {
            Ok(()) => {}
            Err(e) if e.is_expected_on_pause() => {
                debug!("Pause of '{}' treated as already stopped: {}", self.name, e);
            }
            Err(e) => {
                warn!("Unexpected error pausing playlist '{}': {}", self.name, e);
            }
        }
        self.started = false;
    }

    /// Releases the source. Playlist sources own no timers.
    pub fn cleanup(&mut self) {
        self.started = false;
    }
}

// ============================================================================
// Tests
// ============================================================================
