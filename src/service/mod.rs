//! External music-service integration.
//!
//! The engine drives playlist playback through the [`MusicServiceClient`]
//! capability: list playlists and devices, start playback of a URI, pause.
//! Authentication is delegated to a [`TokenProvider`]; the OAuth browser
//! exchange itself lives outside this crate and only the cached bearer
//! token is consumed here.

mod client;
mod error;

pub use client::HttpMusicServiceClient;
pub use error::ServiceError;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::store::{load_cached_token, KeyValueStore};

// ============================================================================
// Data types
// ============================================================================

/// A playlist on the music service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Playlist {
    /// Service playlist URI.
    pub uri: String,
    /// Display name.
    pub name: String,
}

/// A playback-capable device registered with the music service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaybackDevice {
    /// Device id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Whether the service currently considers this device active.
    #[serde(default)]
    pub is_active: bool,
}

// ============================================================================
// TokenProvider
// ============================================================================

/// Supplies a bearer token for music-service requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a currently valid bearer token.
    async fn bearer_token(&self) -> Result<String, ServiceError>;
}

/// Token provider reading the cached token written by the external auth
/// collaborator into the key-value store.
pub struct StoredTokenProvider {
    store: Arc<dyn KeyValueStore>,
}

impl StoredTokenProvider {
    /// Creates a provider over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn bearer_token(&self) -> Result<String, ServiceError> {
        let token = load_cached_token(self.store.as_ref()).ok_or_else(|| {
            ServiceError::TokenUnavailable("トークンがキャッシュされていません".to_string())
        })?;
        if token.expires_at <= Utc::now().timestamp() {
            return Err(ServiceError::TokenUnavailable(
                "トークンの有効期限が切れています".to_string(),
            ));
        }
        Ok(token.access_token)
    }
}

/// Fixed-token provider for tests.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider(pub String);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<String, ServiceError> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// MusicServiceClient
// ============================================================================

/// Capability interface over the external music service.
#[async_trait]
pub trait MusicServiceClient: Send + Sync {
    /// Lists the user's playlists.
    async fn list_playlists(&self) -> Result<Vec<Playlist>, ServiceError>;

    /// Lists the user's playback devices.
    async fn list_devices(&self) -> Result<Vec<PlaybackDevice>, ServiceError>;

    /// Starts playback of the given URI, optionally on a specific device.
    async fn start_playback(&self, device_id: Option<&str>, uri: &str)
        -> Result<(), ServiceError>;

    /// Pauses playback. May fail with an expected error when nothing is
    /// playing; see [`ServiceError::is_expected_on_pause`].
    async fn pause_playback(&self) -> Result<(), ServiceError>;
}

// ============================================================================
// MockMusicServiceClient
// ============================================================================

/// Mock music-service client for testing.
///
/// Can simulate a remote player that needs a number of attempts before it
/// is ready, for retry-policy tests.
#[derive(Debug, Default)]
pub struct MockMusicServiceClient {
    start_calls: Mutex<Vec<String>>,
    pause_calls: AtomicU32,
    not_ready_times: AtomicU32,
    fail_pause_unexpected: AtomicBool,
    playlists: Mutex<Vec<Playlist>>,
    devices: Mutex<Vec<PlaybackDevice>>,
}

impl MockMusicServiceClient {
    /// Creates a mock client that accepts playback immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` start attempts fail with "device not ready".
    pub fn set_not_ready_times(&self, n: u32) {
        self.not_ready_times.store(n, Ordering::SeqCst);
    }

    /// Makes pause fail with an unexpected (non-pause-safe) error.
    pub fn set_fail_pause_unexpected(&self, fail: bool) {
        self.fail_pause_unexpected.store(fail, Ordering::SeqCst);
    }

    /// Sets the playlists returned by `list_playlists`.
    pub fn set_playlists(&self, playlists: Vec<Playlist>) {
        *self.playlists.lock().unwrap() = playlists;
    }

    /// Sets the devices returned by `list_devices`.
    pub fn set_devices(&self, devices: Vec<PlaybackDevice>) {
        *self.devices.lock().unwrap() = devices;
    }

    /// Returns the URIs passed to successful and failed start attempts.
    #[must_use]
    pub fn start_calls(&self) -> Vec<String> {
        self.start_calls.lock().unwrap().clone()
    }

    /// Returns how many times pause was called.
    #[must_use]
    pub fn pause_count(&self) -> u32 {
        self.pause_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MusicServiceClient for MockMusicServiceClient {
    async fn list_playlists(&self) -> Result<Vec<Playlist>, ServiceError> {
        Ok(self.playlists.lock().unwrap().clone())
    }

    async fn list_devices(&self) -> Result<Vec<PlaybackDevice>, ServiceError> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn start_playback(
        &self,
        _device_id: Option<&str>,
        uri: &str,
    ) -> Result<(), ServiceError> {
        self.start_calls.lock().unwrap().push(uri.to_string());
        let remaining = self.not_ready_times.load(Ordering::SeqCst);
        if remaining > 0 {
            self.not_ready_times.store(remaining - 1, Ordering::SeqCst);
            return Err(ServiceError::DeviceNotReady);
        }
        Ok(())
    }

    async fn pause_playback(&self) -> Result<(), ServiceError> {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pause_unexpected.load(Ordering::SeqCst) {
            return Err(ServiceError::Api {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
