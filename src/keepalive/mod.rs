//! Background keep-alive capability.
//!
//! A keep-alive is a minimal continuous activity whose sole purpose is to
//! discourage the OS from suspending the process before a scheduled alarm
//! can fire. The silent-audio implementation holds an output sink playing
//! endless silence at zero volume; platforms that do not need the
//! workaround supply [`NoopKeepAlive`].
//!
//! Starting is re-entrant: a `start` always tears down any prior instance
//! first, so rapid foreground/background flapping can never accumulate
//! duplicate keep-alive activities.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use crossbeam_channel::{bounded, Sender};
use rodio::source::Zero;
use rodio::{OutputStream, Sink};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::audio::AudioError;

// ============================================================================
// BackgroundKeepAlive
// ============================================================================

/// Capability that keeps the process schedulable while alarms are pending.
#[async_trait]
pub trait BackgroundKeepAlive: Send + Sync {
    /// Starts the keep-alive activity, tearing down any prior instance.
    async fn start(&self) -> Result<(), AudioError>;

    /// Stops the keep-alive activity. Stopping an inactive keep-alive is
    /// a no-op.
    async fn stop(&self);

    /// Returns true while the keep-alive activity is running.
    fn is_active(&self) -> bool;
}

// ============================================================================
// SilentAudioKeepAlive
// ============================================================================

/// Keep-alive that plays endless silence at zero volume on its own thread.
#[derive(Default)]
pub struct SilentAudioKeepAlive {
    // Dropping the sender shuts the worker down; Option is the activity flag.
    shutdown: Mutex<Option<Sender<()>>>,
    active: AtomicBool,
}

impl SilentAudioKeepAlive {
    /// Creates an inactive keep-alive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackgroundKeepAlive for SilentAudioKeepAlive {
    async fn start(&self) -> Result<(), AudioError> {
        let mut slot = self.shutdown.lock().await;

        // Re-entrancy guard: always tear down the previous instance first.
        if slot.take().is_some() {
            debug!("Replacing existing keep-alive activity");
        }
        self.active.store(false, Ordering::SeqCst);

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (init_tx, init_rx) = tokio::sync::oneshot::channel();

        std::thread::Builder::new()
            .name("keep-alive".to_string())
            .spawn(move || {
                let (_stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = init_tx.send(Err(AudioError::DeviceNotAvailable(e.to_string())));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = init_tx.send(Err(AudioError::Playback(e.to_string())));
                        return;
                    }
                };
                sink.set_volume(0.0);
                sink.append(Zero::<f32>::new(1, 44_100));
                sink.play();
                let _ = init_tx.send(Ok(()));

                // Park until the handle is dropped or stop is called.
                let _ = shutdown_rx.recv();
                debug!("Keep-alive worker exiting");
            })
            .map_err(|e| AudioError::DeviceNotAvailable(e.to_string()))?;

        match init_rx.await {
            Ok(Ok(())) => {
                *slot = Some(shutdown_tx);
                self.active.store(true, Ordering::SeqCst);
                debug!("Keep-alive started");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Keep-alive unavailable: {}", e);
                Err(e)
            }
            Err(_) => Err(AudioError::DeviceNotAvailable(
                "キープアライブの初期化に失敗しました".to_string(),
            )),
        }
    }

    async fn stop(&self) {
        let mut slot = self.shutdown.lock().await;
        if slot.take().is_some() {
            debug!("Keep-alive stopped");
        }
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ============================================================================
// NoopKeepAlive
// ============================================================================

/// Keep-alive for platforms that do not need the silent-audio workaround.
/// Tracks the requested state but performs no activity.
#[derive(Debug, Default)]
pub struct NoopKeepAlive {
    active: AtomicBool,
}

impl NoopKeepAlive {
    /// Creates an inactive no-op keep-alive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BackgroundKeepAlive for NoopKeepAlive {
    async fn start(&self) -> Result<(), AudioError> {
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockKeepAlive
// ============================================================================

/// Mock keep-alive for testing; counts starts and stops.
#[derive(Debug, Default)]
pub struct MockKeepAlive {
    active: AtomicBool,
    starts: AtomicU32,
    stops: AtomicU32,
}

impl MockKeepAlive {
    /// Creates an inactive mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `start` calls so far.
    #[must_use]
    pub fn start_count(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls so far.
    #[must_use]
    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackgroundKeepAlive for MockKeepAlive {
    async fn start(&self) -> Result<(), AudioError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================
