//! Real audio session implementation using stream-download and rodio.
//!
//! The rodio output stream is not `Send`, so the device lives on a dedicated
//! worker thread; trait methods send commands over a channel and await the
//! reply. The HTTP side (opening the stream) happens in the async caller and
//! only the ready reader is handed to the worker.

use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rodio::{Decoder, OutputStream, Sink};
use stream_download::source::DecodeError;
use stream_download::storage::temp::TempStorageProvider;
use stream_download::{Settings, StreamDownload};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{AudioError, AudioSession, PlaybackStatus};

// ============================================================================
// StreamReader
// ============================================================================

/// Unifies `Read + Seek + Send` for trait objects.
trait ReadSeek: Read + Seek + Send {}
impl<T: Read + Seek + Send> ReadSeek for T {}

/// Wraps the download reader in a mutex so the decoder input is `Sync`,
/// which rodio requires of appended sources.
struct StreamReader {
    inner: Mutex<Box<dyn ReadSeek>>,
}

impl StreamReader {
    fn new(reader: Box<dyn ReadSeek>) -> Self {
        Self {
            inner: Mutex::new(reader),
        }
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut guard = self.inner.lock().expect("reader mutex poisoned");
        guard.read(buf)
    }
}

impl Seek for StreamReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let mut guard = self.inner.lock().expect("reader mutex poisoned");
        guard.seek(pos)
    }
}

// ============================================================================
// Worker commands
// ============================================================================

enum SessionCommand {
    Load {
        reader: StreamReader,
        reply: oneshot::Sender<Result<(), AudioError>>,
    },
    Play {
        reply: oneshot::Sender<Result<(), AudioError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<(), AudioError>>,
    },
    Unload {
        reply: oneshot::Sender<Result<(), AudioError>>,
    },
    Status {
        reply: oneshot::Sender<PlaybackStatus>,
    },
}

// ============================================================================
// StreamAudioSession
// ============================================================================

/// Audio session backed by stream-download (HTTP reader with temp-file
/// buffering) and rodio (decode and output).
pub struct StreamAudioSession {
    commands: Sender<SessionCommand>,
    background_enabled: AtomicBool,
}

impl StreamAudioSession {
    /// Creates the session and its worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::DeviceNotAvailable`] if no output device can be
    /// initialized.
    pub async fn new() -> Result<Self, AudioError> {
        let (tx, rx) = unbounded();
        let (init_tx, init_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("audio-session".to_string())
            .spawn(move || worker_loop(rx, init_tx))
            .map_err(|e| AudioError::DeviceNotAvailable(e.to_string()))?;

        match init_rx.await {
            Ok(Ok(())) => Ok(Self {
                commands: tx,
                background_enabled: AtomicBool::new(false),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AudioError::DeviceNotAvailable(
                "ワーカースレッドが応答しません".to_string(),
            )),
        }
    }

    /// Creates the session, returning `None` (with a warning) if audio is
    /// unavailable so the daemon can continue without playback.
    pub async fn new_with_fallback() -> Option<Self> {
        match Self::new().await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Audio not available, playback disabled: {}", e);
                None
            }
        }
    }

    /// Returns true if background playback has been enabled.
    #[must_use]
    pub fn background_playback_enabled(&self) -> bool {
        self.background_enabled.load(Ordering::SeqCst)
    }

    async fn send<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, AudioError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .map_err(|_| AudioError::DeviceNotAvailable("ワーカーが停止しています".to_string()))?;
        reply_rx
            .await
            .map_err(|_| AudioError::DeviceNotAvailable("ワーカーが停止しています".to_string()))
    }
}

#[async_trait]
impl AudioSession for StreamAudioSession {
    async fn set_background_playback(&self, enabled: bool) -> Result<(), AudioError> {
        self.background_enabled.store(enabled, Ordering::SeqCst);
        debug!("Background playback flag set: {}", enabled);
        Ok(())
    }

    async fn load(&self, url: &str) -> Result<(), AudioError> {
        let parsed: reqwest::Url = url
            .parse()
            .map_err(|_| AudioError::InvalidUrl(url.to_string()))?;

        let reader = match StreamDownload::new_http(
            parsed,
            TempStorageProvider::default(),
            Settings::default(),
        )
        .await
        {
            Ok(reader) => reader,
            Err(e) => return Err(AudioError::StreamOpen(e.decode_error().await)),
        };

        debug!("Stream opened: {}", url);
        self.send(|reply| SessionCommand::Load {
            reader: StreamReader::new(Box::new(reader)),
            reply,
        })
        .await?
    }

    async fn play(&self) -> Result<(), AudioError> {
        self.send(|reply| SessionCommand::Play { reply }).await?
    }

    async fn stop(&self) -> Result<(), AudioError> {
        self.send(|reply| SessionCommand::Stop { reply }).await?
    }

    async fn unload(&self) -> Result<(), AudioError> {
        self.send(|reply| SessionCommand::Unload { reply }).await?
    }

    async fn status(&self) -> PlaybackStatus {
        self.send(|reply| SessionCommand::Status { reply })
            .await
            .unwrap_or_default()
    }
}

// ============================================================================
// Worker thread
// ============================================================================

fn worker_loop(commands: Receiver<SessionCommand>, init_tx: oneshot::Sender<Result<(), AudioError>>) {
    // The output stream must stay alive on this thread for playback to work.
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            let _ = init_tx.send(Err(AudioError::DeviceNotAvailable(e.to_string())));
            return;
        }
    };
    let _ = init_tx.send(Ok(()));
    debug!("Audio worker started");

    let mut sink: Option<Sink> = None;

    while let Ok(command) = commands.recv() {
        match command {
            SessionCommand::Load { reader, reply } => {
                let result = (|| {
                    let decoder = Decoder::new(reader)
                        .map_err(|e| AudioError::Decode(e.to_string()))?;
                    let new_sink = Sink::try_new(&handle)
                        .map_err(|e| AudioError::Playback(e.to_string()))?;
                    new_sink.pause();
                    new_sink.append(decoder);
                    // Replacing the sink stops whatever was loaded before.
                    sink = Some(new_sink);
                    Ok(())
                })();
                let _ = reply.send(result);
            }
            SessionCommand::Play { reply } => {
                let result = match &sink {
                    Some(s) => {
                        s.play();
                        Ok(())
                    }
                    None => Err(AudioError::NotLoaded),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Stop { reply } => {
                let result = match &sink {
                    Some(s) => {
                        s.pause();
                        Ok(())
                    }
                    None => Err(AudioError::NotLoaded),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Unload { reply } => {
                let result = match sink.take() {
                    Some(s) => {
                        s.stop();
                        Ok(())
                    }
                    None => Err(AudioError::NotLoaded),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Status { reply } => {
                let status = match &sink {
                    Some(s) => PlaybackStatus {
                        is_loaded: true,
                        is_playing: !s.is_paused() && !s.empty(),
                    },
                    None => PlaybackStatus::unloaded(),
                };
                let _ = reply.send(status);
            }
        }
    }

    debug!("Audio worker stopped");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // These tests may run in environments without audio hardware
    // (e.g. CI containers) and skip themselves when the device is missing.

    #[tokio::test]
    async fn test_new_without_device_does_not_panic() {
        let _ = StreamAudioSession::new().await;
    }

    #[tokio::test]
    async fn test_new_with_fallback_never_errors() {
        let _ = StreamAudioSession::new_with_fallback().await;
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let session = match StreamAudioSession::new().await {
            Ok(s) => s,
            Err(_) => return, // no audio device
        };

        let err = session.load("not a url").await.unwrap_err();
        assert!(matches!(err, AudioError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_operations_without_load_are_not_loaded() {
        let session = match StreamAudioSession::new().await {
            Ok(s) => s,
            Err(_) => return,
        };

        assert!(matches!(
            session.play().await.unwrap_err(),
            AudioError::NotLoaded
        ));
        assert!(session.stop().await.unwrap_err().is_expected_on_stop());
        assert!(session.unload().await.unwrap_err().is_expected_on_stop());
        assert_eq!(session.status().await, PlaybackStatus::unloaded());
    }

    #[tokio::test]
    async fn test_background_flag() {
        let session = match StreamAudioSession::new().await {
            Ok(s) => s,
            Err(_) => return,
        };

        assert!(!session.background_playback_enabled());
        session.set_background_playback(true).await.unwrap();
        assert!(session.background_playback_enabled());
    }
}
