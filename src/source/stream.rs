//! Radio-style stream audio source.
//!
//! Plays a continuous stream URL through the shared audio session and owns
//! a monitoring loop that notices silently stalled playback: if the session
//! stopped while the source believes it should be playing, the monitor
//! resumes it, and if the stream was unloaded underneath it, the monitor
//! reloads the stream from scratch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::audio::{AudioError, AudioSession};

use super::best_effort_stop;
use super::error::SourceError;

/// Opens the stream and starts playback. Shared by the initial `play` and
/// the monitor's full-reload path.
async fn start_stream(session: &dyn AudioSession, url: &str) -> Result<(), AudioError> {
    session.load(url).await?;
    session.play().await
}

/// A playing (or playable) radio stream.
pub struct StreamSource {
    name: String,
    url: String,
    session: Arc<dyn AudioSession>,
    monitor_interval: Duration,
    should_play: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
}

impl StreamSource {
    /// Creates a stream source; nothing plays until [`StreamSource::play`].
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        session: Arc<dyn AudioSession>,
        monitor_interval: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            session,
            monitor_interval,
            should_play: Arc::new(AtomicBool::new(false)),
            stopping: Arc::new(AtomicBool::new(false)),
            monitor: None,
        }
    }

    /// Human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configures the session for background playback, opens the stream,
    /// and starts the monitoring loop.
    pub async fn play(&mut self) -> Result<(), SourceError> {
        self.session.set_background_playback(true).await?;
        start_stream(self.session.as_ref(), &self.url).await?;
        self.should_play.store(true, Ordering::SeqCst);

        let session = Arc::clone(&self.session);
        let should_play = Arc::clone(&self.should_play);
        let url = self.url.clone();
        let name = self.name.clone();
        let monitor_interval = self.monitor_interval;

        self.monitor = Some(tokio::spawn(async move {
            let mut ticker = interval(monitor_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; skip it so the monitor
            // only observes playback after a full interval.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !should_play.load(Ordering::SeqCst) {
                    break;
                }

                let status = session.status().await;
                if status.is_playing {
                    continue;
                }
                if !should_play.load(Ordering::SeqCst) {
                    break;
                }

                if status.is_loaded {
                    debug!("Stream '{}' stalled; resuming", name);
                    if let Err(e) = session.play().await {
                        warn!("Failed to resume stream '{}': {}", name, e);
                    }
                } else {
                    warn!("Stream '{}' was unloaded; reloading", name);
                    if let Err(e) = start_stream(session.as_ref(), &url).await {
                        warn!("Failed to reload stream '{}': {}", name, e);
                    }
                }
            }
            debug!("Stream monitor for '{}' exited", name);
        }));

        Ok(())
    }

    /// Cancels the monitor and issues a best-effort stop through the shared
    /// session. An in-flight stop ignores a second concurrent request.
    pub async fn stop(&mut self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            debug!("Stop already in flight for stream '{}'", self.name);
            return;
        }

        self.should_play.store(false, Ordering::SeqCst);
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        best_effort_stop(self.session.as_ref()).await;

        self.stopping.store(false, Ordering::SeqCst);
    }

    /// Releases the monitor without touching the session. Safe to call
    /// repeatedly; no timers survive cleanup.
    pub fn cleanup(&mut self) {
        self.should_play.store(false, Ordering::SeqCst);
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// ============================================================================
// Tests
// ============================================================================
