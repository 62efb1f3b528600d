//! REST client for the external music service.
//!
//! Thin wrapper over the service's player API: playlists, devices, and
//! start/pause of playback on a device. Every request carries a bearer
//! token obtained from the [`TokenProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{MusicServiceClient, Playlist, PlaybackDevice, ServiceError, TokenProvider};

/// Default API base URL of the music service.
pub const DEFAULT_API_BASE: &str = "https://api.music.example";

// -- Response envelope types --

#[derive(Debug, Deserialize)]
struct PlaylistsEnvelope {
    #[serde(default)]
    items: Vec<Playlist>,
}

#[derive(Debug, Deserialize)]
struct DevicesEnvelope {
    #[serde(default)]
    devices: Vec<PlaybackDevice>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    reason: Option<String>,
}

/// HTTP implementation of [`MusicServiceClient`].
pub struct HttpMusicServiceClient {
    base_url: String,
    http: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpMusicServiceClient {
    /// Creates a client against the default API base.
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_base_url(DEFAULT_API_BASE, tokens)
    }

    /// Creates a client against a custom API base (used by tests).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            tokens,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Maps a non-success response onto the error taxonomy.
    async fn error_for(response: reqwest::Response) -> ServiceError {
        let status = response.status();
        let body: Option<ErrorEnvelope> = response.json().await.ok();
        let (message, reason) = body
            .map(|b| (b.error.message, b.error.reason))
            .unwrap_or_default();

        // The player endpoints report an absent or sleeping device either
        // via 404 or an explicit reason code.
        if status == StatusCode::NOT_FOUND
            || reason.as_deref() == Some("NO_ACTIVE_DEVICE")
            || status == StatusCode::BAD_GATEWAY
        {
            return ServiceError::DeviceNotReady;
        }

        ServiceError::Api {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl MusicServiceClient for HttpMusicServiceClient {
    async fn list_playlists(&self) -> Result<Vec<Playlist>, ServiceError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .get(self.url("/v1/me/playlists"))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let envelope: PlaylistsEnvelope =
            response.json().await.map_err(|_| ServiceError::Parse)?;
        Ok(envelope.items)
    }

    async fn list_devices(&self) -> Result<Vec<PlaybackDevice>, ServiceError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .get(self.url("/v1/me/player/devices"))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let envelope: DevicesEnvelope = response.json().await.map_err(|_| ServiceError::Parse)?;
        Ok(envelope.devices)
    }

    async fn start_playback(
        &self,
        device_id: Option<&str>,
        uri: &str,
    ) -> Result<(), ServiceError> {
        let token = self.tokens.bearer_token().await?;
        let mut request = self
            .http
            .put(self.url("/v1/me/player/play"))
            .bearer_auth(token)
            .json(&json!({ "context_uri": uri }));
        if let Some(device_id) = device_id {
            request = request.query(&[("device_id", device_id)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        debug!("Playback started: {}", uri);
        Ok(())
    }

    async fn pause_playback(&self) -> Result<(), ServiceError> {
        let token = self.tokens.bearer_token().await?;
        let response = self
            .http
            .put(self.url("/v1/me/player/pause"))
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        Ok(())
    }
}
