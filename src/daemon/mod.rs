//! Daemon module for the alarm clock.
//!
//! This module contains the long-running daemon process:
//! - `ipc`: Unix Domain Socket server and request handling
//! - Component wiring and the event loop that routes notification
//!   triggers, user responses, and IPC commands into the alarm manager

pub mod ipc;

pub use ipc::{IpcServer, RequestHandler};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::audio::{AudioSession, StreamAudioSession, UnavailableAudioSession};
use crate::checker::BackgroundChecker;
use crate::config::EngineConfig;
use crate::keepalive::{BackgroundKeepAlive, SilentAudioKeepAlive};
use crate::manager::AlarmManager;
use crate::notify::{AlarmNotifier, NotifierEvent, TokioNotifier, UserResponse};
use crate::service::{HttpMusicServiceClient, MusicServiceClient, StoredTokenProvider};
use crate::source::AudioSourceFactory;
use crate::store::{AlarmStore, JsonFileStore, KeyValueStore};
use crate::trigger::TriggerRegistry;

/// Directory name under the home directory for daemon state.
const DATA_DIR_NAME: &str = ".mezamashi";

/// Socket file name inside the data directory.
const SOCKET_FILE_NAME: &str = "mezamashi.sock";

// ============================================================================
// DaemonOptions
// ============================================================================

/// Filesystem locations and engine configuration for a daemon run.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Unix socket path for IPC.
    pub socket_path: PathBuf,
    /// Directory for the JSON key-value store.
    pub data_dir: PathBuf,
    /// Engine configuration.
    pub config: EngineConfig,
}

impl DaemonOptions {
    /// Resolves the default locations under the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir().context("ホームディレクトリが見つかりません")?;
        let data_dir = home.join(DATA_DIR_NAME);
        Ok(Self {
            socket_path: data_dir.join(SOCKET_FILE_NAME),
            data_dir,
            config: EngineConfig::default(),
        })
    }

    /// Returns the default socket path (used by the CLI client).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_socket_path() -> Result<PathBuf> {
        Ok(Self::resolve()?.socket_path)
    }
}

// ============================================================================
// Daemon
// ============================================================================

/// Wires the engine together and runs the daemon event loop until Ctrl-C.
pub async fn run(options: DaemonOptions) -> Result<()> {
    if let Err(message) = options.config.validate() {
        anyhow::bail!(message);
    }

    // Storage
    let kv: Arc<dyn KeyValueStore> =
        Arc::new(JsonFileStore::new(&options.data_dir).context("ストアを初期化できません")?);
    let store = AlarmStore::new(Arc::clone(&kv));

    // Audio session, degrading to an unavailable stub without a device.
    let session: Arc<dyn AudioSession> = match StreamAudioSession::new().await {
        Ok(session) => Arc::new(session),
        Err(e) => {
            warn!("Audio not available, playback disabled: {}", e);
            Arc::new(UnavailableAudioSession)
        }
    };

    // Music service client fed by the cached auth token.
    let tokens = Arc::new(StoredTokenProvider::new(Arc::clone(&kv)));
    let music: Arc<dyn MusicServiceClient> = Arc::new(HttpMusicServiceClient::new(tokens));

    let factory = AudioSourceFactory::new(
        Arc::clone(&session),
        Arc::clone(&music),
        options.config.clone(),
    );
    let registry = Arc::new(TriggerRegistry::with_ttl(options.config.trigger_ttl()));
    let (notifier, mut events) = TokioNotifier::new();
    let notifier = Arc::new(notifier);

    let manager = Arc::new(AlarmManager::new(
        store,
        factory,
        Arc::clone(&notifier) as Arc<dyn AlarmNotifier>,
        registry,
    ));

    // Re-create trigger notifications for alarms persisted before this
    // process started.
    match manager.store().list() {
        Ok(alarms) => {
            for alarm in alarms {
                if let Err(e) = manager.update_alarm(alarm.clone()).await {
                    warn!("Could not reschedule alarm {}: {}", alarm.id, e);
                }
            }
        }
        Err(e) => warn!("Could not load persisted alarms: {}", e),
    }

    let keepalive: Arc<dyn BackgroundKeepAlive> = Arc::new(SilentAudioKeepAlive::new());
    let checker = Arc::new(BackgroundChecker::new(
        Arc::clone(&manager),
        keepalive,
        options.config.checker_interval(),
    ));
    let checker_task = tokio::spawn({
        let checker = Arc::clone(&checker);
        async move { checker.run().await }
    });

    let server = IpcServer::new(&options.socket_path)?;
    let handler = RequestHandler::new(Arc::clone(&manager));
    info!(
        "Daemon listening on {}",
        server.socket_path().display()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(event) => handle_notifier_event(&manager, event).await,
                    None => break,
                }
            }
            connection = server.accept() => {
                match connection {
                    Ok(mut stream) => {
                        match IpcServer::receive_request(&mut stream).await {
                            Ok(request) => {
                                let response = handler.handle(request).await;
                                if let Err(e) =
                                    IpcServer::send_response(&mut stream, &response).await
                                {
                                    warn!("Failed to send IPC response: {}", e);
                                }
                            }
                            Err(e) => warn!("Bad IPC request: {}", e),
                        }
                    }
                    Err(e) => warn!("IPC accept failed: {}", e),
                }
            }
        }
    }

    checker_task.abort();
    // Leave no audio running behind the exiting daemon.
    let _ = manager.stop_alarm().await;
    manager.stop_preview().await;
    Ok(())
}

/// Routes one notifier event into the manager. Per-event failures are
/// logged and never abort the daemon loop.
async fn handle_notifier_event(manager: &Arc<AlarmManager>, event: NotifierEvent) {
    match event {
        NotifierEvent::Fired(payload) => {
            if let Err(e) = manager.on_alarm_due(&payload.alarm_id, Local::now()).await {
                warn!("Error handling trigger for {}: {}", payload.alarm_id, e);
            }
        }
        NotifierEvent::Response { payload, response } => match response {
            UserResponse::Stop => {
                if let Err(e) = manager.stop_alarm().await {
                    warn!("Error stopping alarm {}: {}", payload.alarm_id, e);
                }
            }
            UserResponse::Snooze => {
                if let Err(e) = manager.snooze_alarm(None, Local::now()).await {
                    warn!("Error snoozing alarm {}: {}", payload.alarm_id, e);
                }
            }
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
