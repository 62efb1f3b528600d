//! Engine configuration types.
//!
//! Tunable intervals and retry policy for the alarm engine. Values are
//! serde-defaulted so a partially specified configuration file still loads.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default background checker poll interval in seconds.
fn default_checker_interval_secs() -> u64 {
    30
}

/// Default trigger de-duplication entry lifetime in seconds.
fn default_trigger_ttl_secs() -> u64 {
    60
}

/// Default stream playback monitor interval in seconds.
fn default_stream_monitor_interval_secs() -> u64 {
    5
}

/// Default maximum playlist start attempts.
fn default_playlist_max_attempts() -> u32 {
    3
}

/// Default base delay between playlist start attempts in milliseconds.
fn default_playlist_base_delay_ms() -> u64 {
    2000
}

/// Retry policy for starting playlist playback on the external music
/// service. The remote player may need time to wake, so attempts back off
/// with increasing delays (`base_delay * attempt`).
///
/// The bound and schedule are a tunable policy, not a fixed contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRetryPolicy {
    /// Maximum start attempts before giving up.
    #[serde(default = "default_playlist_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds; attempt `n` waits `n * base`.
    #[serde(default = "default_playlist_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for PlaylistRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_playlist_max_attempts(),
            base_delay_ms: default_playlist_base_delay_ms(),
        }
    }
}

impl PlaylistRetryPolicy {
    /// Returns the delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms * u64::from(attempt))
    }
}

/// Configuration for the alarm engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Background checker poll interval in seconds.
    #[serde(default = "default_checker_interval_secs")]
    pub checker_interval_secs: u64,

    /// Lifetime of trigger de-duplication entries in seconds.
    #[serde(default = "default_trigger_ttl_secs")]
    pub trigger_ttl_secs: u64,

    /// Stream playback monitor interval in seconds.
    #[serde(default = "default_stream_monitor_interval_secs")]
    pub stream_monitor_interval_secs: u64,

    /// Playlist start retry policy.
    #[serde(default)]
    pub playlist_retry: PlaylistRetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            checker_interval_secs: default_checker_interval_secs(),
            trigger_ttl_secs: default_trigger_ttl_secs(),
            stream_monitor_interval_secs: default_stream_monitor_interval_secs(),
            playlist_retry: PlaylistRetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Background checker poll interval.
    #[must_use]
    pub fn checker_interval(&self) -> Duration {
        Duration::from_secs(self.checker_interval_secs)
    }

    /// Trigger de-duplication entry lifetime.
    #[must_use]
    pub fn trigger_ttl(&self) -> Duration {
        Duration::from_secs(self.trigger_ttl_secs)
    }

    /// Stream playback monitor interval.
    #[must_use]
    pub fn stream_monitor_interval(&self) -> Duration {
        Duration::from_secs(self.stream_monitor_interval_secs)
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.checker_interval_secs < 5 || self.checker_interval_secs > 300 {
            return Err("チェック間隔は5-300秒の範囲で指定してください".to_string());
        }
        if self.trigger_ttl_secs < 10 || self.trigger_ttl_secs > 600 {
            return Err("トリガー保持時間は10-600秒の範囲で指定してください".to_string());
        }
        if self.playlist_retry.max_attempts < 1 || self.playlist_retry.max_attempts > 10 {
            return Err("再試行回数は1-10回の範囲で指定してください".to_string());
        }
        Ok(())
    }
}
