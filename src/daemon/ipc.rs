//! IPC server for the alarm daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for alarm commands
//! - Integration with AlarmManager for command execution

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::manager::{AlarmManager, ManagerState};
use crate::types::{
    AddParams, Alarm, AlarmSummary, AlarmTime, IpcRequest, IpcResponse, PlaylistSpec,
    ResponseData, StreamSpec,
};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Socket binding error
    #[error("Failed to bind socket: {0}")]
    BindError(String),

    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Applies a read timeout to prevent blocking indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn receive_request(stream: &mut UnixStream) -> Result<IpcRequest> {
        let mut buffer = vec![0u8; MAX_REQUEST_SIZE];

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            stream.read(&mut buffer),
        )
        .await;

        let n = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        };

        if n == 0 {
            anyhow::bail!("Connection closed by client");
        }

        let request: IpcRequest = serde_json::from_slice(&buffer[..n])
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response(stream: &mut UnixStream, response: &IpcResponse) -> Result<()> {
        let json = serde_json::to_vec(response).context("Failed to serialize IPC response")?;

        stream
            .write_all(&json)
            .await
            .context("Failed to write response")?;
        stream.flush().await.context("Failed to flush response")?;

        Ok(())
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        // Clean up socket file on drop
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the alarm manager.
pub struct RequestHandler {
    /// Shared reference to the alarm manager
    manager: Arc<AlarmManager>,
}

impl RequestHandler {
    /// Creates a new request handler with the given alarm manager.
    pub fn new(manager: Arc<AlarmManager>) -> Self {
        Self { manager }
    }

    /// Handles an IPC request and returns the appropriate response.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Add { params } => self.handle_add(params).await,
            IpcRequest::List => self.handle_list(),
            IpcRequest::Enable { id } => self.handle_toggle(&id, true).await,
            IpcRequest::Disable { id } => self.handle_toggle(&id, false).await,
            IpcRequest::Delete { id } => self.handle_delete(&id).await,
            IpcRequest::Snooze { minutes } => self.handle_snooze(minutes).await,
            IpcRequest::Stop => self.handle_stop().await,
            IpcRequest::Status => self.handle_status(),
            IpcRequest::Preview { params } => match self.manager.start_preview(&params).await {
                Ok(name) => IpcResponse::success(
                    format!("プレビューを開始しました: {name}"),
                    Some(ResponseData {
                        active_source: Some(name),
                        ..Default::default()
                    }),
                ),
                Err(e) => IpcResponse::error(e.to_string()),
            },
            IpcRequest::PreviewStop => {
                self.manager.stop_preview().await;
                IpcResponse::success("プレビューを停止しました", None)
            }
        }
    }

    /// Builds an alarm record from add parameters.
    fn build_alarm(params: &AddParams) -> Result<Alarm, String> {
        let time: AlarmTime = params.time.parse()?;
        let mut alarm = Alarm::new(time);
        alarm.repeat_days = params.repeat_days.iter().copied().collect();

        if let Some(uri) = &params.playlist_uri {
            alarm.playlist = Some(PlaylistSpec {
                uri: uri.clone(),
                name: params.playlist_name.clone().unwrap_or_else(|| uri.clone()),
            });
        }
        if let Some(url) = &params.stream_url {
            alarm.stream = Some(StreamSpec {
                url: url.clone(),
                name: params.stream_name.clone().unwrap_or_else(|| url.clone()),
            });
        }
        if let Some(minutes) = params.snooze_interval_minutes {
            alarm.snooze_interval_minutes = minutes;
        }
        if let Some(enabled) = params.snooze_enabled {
            alarm.snooze_enabled = enabled;
        }
        Ok(alarm)
    }

    /// Handles the add command.
    async fn handle_add(&self, params: AddParams) -> IpcResponse {
        let alarm = match Self::build_alarm(&params) {
            Ok(alarm) => alarm,
            Err(message) => return IpcResponse::error(message),
        };
        let alarm_id = alarm.id.clone();

        match self.manager.add_alarm(alarm).await {
            Ok(()) => IpcResponse::success(
                "アラームを追加しました",
                Some(ResponseData {
                    alarm_id: Some(alarm_id),
                    ..Default::default()
                }),
            ),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the list command.
    fn handle_list(&self) -> IpcResponse {
        match self.manager.store().list() {
            Ok(alarms) => {
                let summaries: Vec<AlarmSummary> =
                    alarms.iter().map(AlarmSummary::from_alarm).collect();
                IpcResponse::success(
                    "",
                    Some(ResponseData {
                        alarms: Some(summaries),
                        ..Default::default()
                    }),
                )
            }
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles enable/disable.
    async fn handle_toggle(&self, id: &str, enabled: bool) -> IpcResponse {
        match self.manager.toggle_alarm(id, enabled).await {
            Ok(_) => {
                let message = if enabled {
                    "アラームを有効にしました"
                } else {
                    "アラームを無効にしました"
                };
                IpcResponse::success(message, None)
            }
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the delete command.
    async fn handle_delete(&self, id: &str) -> IpcResponse {
        match self.manager.delete_alarm(id).await {
            Ok(true) => IpcResponse::success("アラームを削除しました", None),
            Ok(false) => IpcResponse::error(format!("アラームが見つかりません: {id}")),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the snooze command.
    async fn handle_snooze(&self, minutes: Option<u32>) -> IpcResponse {
        match self.manager.snooze_alarm(minutes, Local::now()).await {
            Ok(()) => IpcResponse::success("アラームをスヌーズしました", None),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the stop command.
    async fn handle_stop(&self) -> IpcResponse {
        match self.manager.stop_alarm().await {
            Ok(()) => IpcResponse::success("アラームを停止しました", None),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    /// Handles the status command.
    fn handle_status(&self) -> IpcResponse {
        let state = self.manager.state();
        let alarm_id = match &state {
            ManagerState::Triggered { alarm_id, .. } => Some(alarm_id.clone()),
            ManagerState::Snoozed { alarm_id, .. } => Some(alarm_id.clone()),
            ManagerState::Idle => None,
        };
        let alarms = self
            .manager
            .store()
            .list()
            .map(|alarms| alarms.iter().map(AlarmSummary::from_alarm).collect())
            .ok();

        debug!("Status requested: {}", state.as_str());
        IpcResponse::success(
            "",
            Some(ResponseData {
                state: Some(state.as_str().to_string()),
                active_source: self.manager.active_audio_source_name(),
                alarm_id,
                alarms,
            }),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioSession, MockAudioSession};
    use crate::config::EngineConfig;
    use crate::notify::{AlarmNotifier, MockNotifier};
    use crate::service::{MockMusicServiceClient, MusicServiceClient};
    use crate::source::AudioSourceFactory;
    use crate::store::{AlarmStore, MemoryKvStore};
    use crate::trigger::TriggerRegistry;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_manager() -> (Arc<AlarmManager>, Arc<MockAudioSession>) {
        let session = Arc::new(MockAudioSession::new());
        let (notifier, _rx) = MockNotifier::new();
        let factory = AudioSourceFactory::new(
            Arc::clone(&session) as Arc<dyn AudioSession>,
            Arc::new(MockMusicServiceClient::new()) as Arc<dyn MusicServiceClient>,
            EngineConfig {
                stream_monitor_interval_secs: 60,
                ..Default::default()
            },
        );
        let manager = Arc::new(AlarmManager::new(
            AlarmStore::new(Arc::new(MemoryKvStore::new())),
            factory,
            Arc::new(notifier) as Arc<dyn AlarmNotifier>,
            Arc::new(TriggerRegistry::new()),
        ));
        (manager, session)
    }

    fn add_params() -> AddParams {
        AddParams {
            time: "06:30".to_string(),
            stream_url: Some("https://radio.example/live".to_string()),
            stream_name: Some("Morning FM".to_string()),
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------------
    // IpcServer Tests
    // ------------------------------------------------------------------------

    mod ipc_server_tests {
        use super::*;

        #[tokio::test]
        async fn test_server_creation() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path);

            assert!(server.is_ok());
            assert!(socket_path.exists());

            drop(server);
        }

        #[tokio::test]
        async fn test_server_removes_existing_socket() {
            let socket_path = create_temp_socket_path();
            std::fs::write(&socket_path, "dummy").unwrap();

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
        }

        #[tokio::test]
        async fn test_server_creates_parent_directory() {
            let dir = tempfile::tempdir().unwrap();
            let socket_path = dir.path().join("subdir").join("test.sock");

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
            assert!(socket_path.parent().unwrap().exists());
        }

        #[tokio::test]
        async fn test_receive_request_status() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                let request = r#"{"command":"status"}"#;
                stream.write_all(request.as_bytes()).await.unwrap();
                stream.flush().await.unwrap();
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await;

            assert!(request.is_ok());
            assert!(matches!(request.unwrap(), IpcRequest::Status));

            client_handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_send_response() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let mut stream = UnixStream::connect(&client_path).await.unwrap();

                let mut buffer = vec![0u8; 4096];
                let n = stream.read(&mut buffer).await.unwrap();
                let response: IpcResponse = serde_json::from_slice(&buffer[..n]).unwrap();
                response
            });

            let mut stream = server.accept().await.unwrap();
            let response = IpcResponse::success("Test message", None);
            IpcServer::send_response(&mut stream, &response)
                .await
                .unwrap();

            let received = client_handle.await.unwrap();
            assert_eq!(received.status, "success");
            assert_eq!(received.message, "Test message");
        }

        #[tokio::test]
        async fn test_receive_request_invalid_json() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client_handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream.write_all(b"not valid json").await.unwrap();
                stream.flush().await.unwrap();
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await;

            assert!(request.is_err());
        }

        #[tokio::test]
        async fn test_server_drop_cleanup() {
            let socket_path = create_temp_socket_path();

            {
                let _server = IpcServer::new(&socket_path).unwrap();
                assert!(socket_path.exists());
            }

            assert!(!socket_path.exists());
        }
    }

    // ------------------------------------------------------------------------
    // RequestHandler Tests
    // ------------------------------------------------------------------------

    mod request_handler_tests {
        use super::*;

        #[tokio::test]
        async fn test_handle_add() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(Arc::clone(&manager));

            let response = handler
                .handle(IpcRequest::Add {
                    params: add_params(),
                })
                .await;

            assert_eq!(response.status, "success");
            assert_eq!(response.message, "アラームを追加しました");
            assert!(response.data.unwrap().alarm_id.is_some());
            assert_eq!(manager.store().list().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_handle_add_invalid_time() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler
                .handle(IpcRequest::Add {
                    params: AddParams {
                        time: "25:99".to_string(),
                        ..add_params()
                    },
                })
                .await;

            assert_eq!(response.status, "error");
        }

        #[tokio::test]
        async fn test_handle_add_without_source() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler
                .handle(IpcRequest::Add {
                    params: AddParams {
                        time: "06:30".to_string(),
                        ..Default::default()
                    },
                })
                .await;

            assert_eq!(response.status, "error");
            assert!(response.message.contains("サウンドソース"));
        }

        #[tokio::test]
        async fn test_handle_list() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            handler
                .handle(IpcRequest::Add {
                    params: add_params(),
                })
                .await;

            let response = handler.handle(IpcRequest::List).await;
            assert_eq!(response.status, "success");
            let alarms = response.data.unwrap().alarms.unwrap();
            assert_eq!(alarms.len(), 1);
            assert_eq!(alarms[0].time, "06:30");
        }

        #[tokio::test]
        async fn test_handle_enable_disable() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(Arc::clone(&manager));

            let response = handler
                .handle(IpcRequest::Add {
                    params: add_params(),
                })
                .await;
            let id = response.data.unwrap().alarm_id.unwrap();

            let response = handler.handle(IpcRequest::Disable { id: id.clone() }).await;
            assert_eq!(response.status, "success");
            assert!(!manager.store().get(&id).unwrap().unwrap().enabled);

            let response = handler.handle(IpcRequest::Enable { id: id.clone() }).await;
            assert_eq!(response.status, "success");
            assert!(manager.store().get(&id).unwrap().unwrap().enabled);
        }

        #[tokio::test]
        async fn test_handle_delete_unknown() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler
                .handle(IpcRequest::Delete {
                    id: "ghost".to_string(),
                })
                .await;
            assert_eq!(response.status, "error");
            assert!(response.message.contains("見つかりません"));
        }

        #[tokio::test]
        async fn test_handle_stop_idempotent() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler.handle(IpcRequest::Stop).await;
            assert_eq!(response.status, "success");

            let response = handler.handle(IpcRequest::Stop).await;
            assert_eq!(response.status, "success");
        }

        #[tokio::test]
        async fn test_handle_snooze_not_ringing() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler.handle(IpcRequest::Snooze { minutes: None }).await;
            assert_eq!(response.status, "error");
            assert!(response.message.contains("鳴っていません"));
        }

        #[tokio::test]
        async fn test_handle_status_idle() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler.handle(IpcRequest::Status).await;
            assert_eq!(response.status, "success");

            let data = response.data.unwrap();
            assert_eq!(data.state, Some("idle".to_string()));
            assert!(data.active_source.is_none());
        }

        #[tokio::test]
        async fn test_handle_status_triggered() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(Arc::clone(&manager));

            let response = handler
                .handle(IpcRequest::Add {
                    params: add_params(),
                })
                .await;
            let id = response.data.unwrap().alarm_id.unwrap();
            manager.on_alarm_due(&id, Local::now()).await.unwrap();

            let response = handler.handle(IpcRequest::Status).await;
            let data = response.data.unwrap();
            assert_eq!(data.state, Some("triggered".to_string()));
            assert_eq!(data.active_source, Some("Morning FM".to_string()));
            assert_eq!(data.alarm_id, Some(id));
        }

        #[tokio::test]
        async fn test_handle_preview_and_stop() {
            let (manager, session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler
                .handle(IpcRequest::Preview {
                    params: crate::types::PreviewParams {
                        stream_url: Some("https://radio.example/live".to_string()),
                        stream_name: Some("Morning FM".to_string()),
                        ..Default::default()
                    },
                })
                .await;
            assert_eq!(response.status, "success");
            assert_eq!(session.call_count("play"), 1);

            let response = handler.handle(IpcRequest::PreviewStop).await;
            assert_eq!(response.status, "success");
            assert_eq!(session.call_count("stop"), 1);
        }

        #[tokio::test]
        async fn test_handle_preview_without_source() {
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let response = handler
                .handle(IpcRequest::Preview {
                    params: crate::types::PreviewParams::default(),
                })
                .await;
            assert_eq!(response.status, "error");
        }
    }

    // ------------------------------------------------------------------------
    // Integration Tests
    // ------------------------------------------------------------------------

    mod integration_tests {
        use super::*;

        #[tokio::test]
        async fn test_full_ipc_flow() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let (manager, _session) = create_manager();
            let handler = RequestHandler::new(manager);

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let mut stream = UnixStream::connect(&client_path).await.unwrap();

                let request =
                    r#"{"command":"add","time":"06:30","streamUrl":"https://radio.example/live","streamName":"Morning FM"}"#;
                stream.write_all(request.as_bytes()).await.unwrap();
                stream.flush().await.unwrap();

                let mut buffer = vec![0u8; 4096];
                let n = stream.read(&mut buffer).await.unwrap();
                let response: IpcResponse = serde_json::from_slice(&buffer[..n]).unwrap();
                response
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await.unwrap();
            let response = handler.handle(request).await;
            IpcServer::send_response(&mut stream, &response)
                .await
                .unwrap();

            let client_response = client_handle.await.unwrap();
            assert_eq!(client_response.status, "success");
            assert_eq!(client_response.message, "アラームを追加しました");
        }
    }
}
