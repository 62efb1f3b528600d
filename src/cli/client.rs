//! IPC client for communicating with the alarm daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::cli::commands::{AddArgs, PreviewArgs};
use crate::daemon::DaemonOptions;
use crate::types::{AddParams, IpcRequest, IpcResponse, PreviewParams};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (64KB)
const MAX_RESPONSE_SIZE: usize = 65536;

/// Maximum retry attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with the default socket path.
    pub fn new() -> Result<Self> {
        Ok(Self::with_socket_path(DaemonOptions::default_socket_path()?))
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Sends an add command to the daemon.
    pub async fn add(&self, args: &AddArgs) -> Result<IpcResponse> {
        let params = AddParams {
            time: args.time.clone(),
            repeat_days: args.days.clone(),
            stream_url: args.stream_url.clone(),
            stream_name: args.stream_name.clone(),
            playlist_uri: args.playlist_uri.clone(),
            playlist_name: args.playlist_name.clone(),
            snooze_interval_minutes: args.snooze_interval,
            snooze_enabled: if args.no_snooze { Some(false) } else { None },
        };

        self.send_request_with_retry(&IpcRequest::Add { params })
            .await
    }

    /// Sends a list command to the daemon.
    pub async fn list(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::List).await
    }

    /// Sends an enable command to the daemon.
    pub async fn enable(&self, id: &str) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Enable { id: id.to_string() })
            .await
    }

    /// Sends a disable command to the daemon.
    pub async fn disable(&self, id: &str) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Disable { id: id.to_string() })
            .await
    }

    /// Sends a delete command to the daemon.
    pub async fn delete(&self, id: &str) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Delete { id: id.to_string() })
            .await
    }

    /// Sends a snooze command to the daemon.
    pub async fn snooze(&self, minutes: Option<u32>) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Snooze { minutes })
            .await
    }

    /// Sends a stop command to the daemon.
    pub async fn stop(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Stop).await
    }

    /// Sends a status query to the daemon.
    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::Status).await
    }

    /// Sends a preview command to the daemon.
    pub async fn preview(&self, args: &PreviewArgs) -> Result<IpcResponse> {
        let params = PreviewParams {
            stream_url: args.stream_url.clone(),
            stream_name: args.stream_name.clone(),
            playlist_uri: args.playlist_uri.clone(),
            playlist_name: args.playlist_name.clone(),
        };
        self.send_request_with_retry(&IpcRequest::Preview { params })
            .await
    }

    /// Sends a preview-stop command to the daemon.
    pub async fn preview_stop(&self) -> Result<IpcResponse> {
        self.send_request_with_retry(&IpcRequest::PreviewStop).await
    }

    /// Sends a request to the daemon with retry logic.
    async fn send_request_with_retry(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!("リクエスト失敗 (試行 {}/{}): {}", attempt, MAX_RETRIES, e);
                    last_error = Some(e);

                    if attempt < MAX_RETRIES {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("デーモンに接続できません")))
            .context("デーモンが起動しているか確認してください (mezamashi daemon)")
    }

    /// Sends one request and reads the response.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .with_context(|| {
                format!("ソケットに接続できません: {}", self.socket_path.display())
            })?;

        let payload = serde_json::to_vec(request).context("リクエストを作成できません")?;
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(&payload),
        )
        .await
        .context("送信がタイムアウトしました")?
        .context("リクエストを送信できません")?;
        stream.flush().await.context("リクエストを送信できません")?;

        let mut buffer = vec![0u8; MAX_RESPONSE_SIZE];
        let n = timeout(Duration::from_secs(IO_TIMEOUT_SECS), stream.read(&mut buffer))
            .await
            .context("受信がタイムアウトしました")?
            .context("レスポンスを受信できません")?;

        if n == 0 {
            anyhow::bail!("デーモンが応答を返しませんでした");
        }

        serde_json::from_slice(&buffer[..n]).context("レスポンスの形式が不正です")
    }
}

// ============================================================================
// Tests
// ============================================================================
