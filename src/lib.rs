//! Radio Alarm Clock Library
//!
//! This library provides the core functionality for the mezamashi alarm
//! clock daemon and CLI. It includes:
//! - Alarm manager with the scheduled → triggered → snoozed lifecycle
//! - Dual-path triggering: scheduled notifications plus a periodic
//!   background checker, de-duplicated through a trigger registry
//! - Audio sources for internet radio streams and music-service playlists
//! - Background keep-alive to discourage process suspension
//! - Persistent key-value storage for alarms, favorites, and tokens
//! - IPC server/client for daemon-CLI communication

pub mod audio;
pub mod checker;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod keepalive;
pub mod manager;
pub mod notify;
pub mod schedule;
pub mod service;
pub mod source;
pub mod store;
pub mod trigger;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    AddParams, Alarm, AlarmSummary, AlarmTime, IpcRequest, IpcResponse, PlaylistSpec,
    PreviewParams, ResponseData, StreamSpec,
};

// Re-export engine components
pub use checker::BackgroundChecker;
pub use config::{EngineConfig, PlaylistRetryPolicy};
pub use manager::{AlarmManager, ManagerState};
pub use schedule::{evaluate, next_occurrence, DueReason};
pub use trigger::TriggerRegistry;

// Re-export capability traits and implementations
pub use audio::{
    AudioError, AudioSession, MockAudioSession, PlaybackStatus, StreamAudioSession,
    UnavailableAudioSession,
};
pub use keepalive::{BackgroundKeepAlive, MockKeepAlive, NoopKeepAlive, SilentAudioKeepAlive};
pub use notify::{
    AlarmNotifier, MockNotifier, NotificationPayload, NotifierEvent, NotifyError, TokioNotifier,
    UserResponse,
};
pub use service::{
    HttpMusicServiceClient, MockMusicServiceClient, MusicServiceClient, PlaybackDevice, Playlist,
    ServiceError, StaticTokenProvider, StoredTokenProvider, TokenProvider,
};
pub use source::{AlarmAudioSource, AudioSourceFactory, PlaylistSource, SourceError, StreamSource};
pub use store::{
    AlarmStore, CachedList, CachedToken, FavoriteStation, JsonFileStore, KeyValueStore,
    MemoryKvStore, StoreError,
};
