//! Core data types for the alarm clock engine.
//!
//! This module defines the data structures used for:
//! - Alarm records (schedule, repeat days, sound source, snooze policy)
//! - Minute-granular alarm times
//! - IPC request/response serialization

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AlarmTime
// ============================================================================

/// A wall-clock "HH:MM" time, interpreted in local device time.
///
/// Seconds are intentionally not representable; alarm firing is
/// minute-granular.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlarmTime {
    hour: u32,
    minute: u32,
}

impl AlarmTime {
    /// Creates a new alarm time.
    ///
    /// # Errors
    ///
    /// Returns an error message if the hour or minute is out of range.
    pub fn new(hour: u32, minute: u32) -> Result<Self, String> {
        if hour > 23 {
            return Err("時は0-23の範囲で指定してください".to_string());
        }
        if minute > 59 {
            return Err("分は0-59の範囲で指定してください".to_string());
        }
        Ok(Self { hour, minute })
    }

    /// Returns the hour (0-23).
    #[must_use]
    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Returns the minute (0-59).
    #[must_use]
    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Returns the `(hour, minute)` pair used for minute-granular comparison.
    #[must_use]
    pub fn as_tuple(&self) -> (u32, u32) {
        (self.hour, self.minute)
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for AlarmTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| format!("時刻の形式が不正です (HH:MM): {s}"))?;
        let hour: u32 = h
            .parse()
            .map_err(|_| format!("時刻の形式が不正です (HH:MM): {s}"))?;
        let minute: u32 = m
            .parse()
            .map_err(|_| format!("時刻の形式が不正です (HH:MM): {s}"))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for AlarmTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlarmTime> for String {
    fn from(value: AlarmTime) -> Self {
        value.to_string()
    }
}

// ============================================================================
// Sound source specs
// ============================================================================

/// A radio-style continuous stream (internet radio station).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSpec {
    /// Stream URL.
    pub url: String,
    /// Human-readable station name.
    pub name: String,
}

/// A playlist on the external music service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSpec {
    /// Playlist URI understood by the music service.
    pub uri: String,
    /// Human-readable playlist name.
    pub name: String,
}

// ============================================================================
// Alarm
// ============================================================================

/// The canonical weekday numbering: 0 = Sunday through 6 = Saturday.
pub const WEEKDAY_SUNDAY: u8 = 0;
/// Saturday under the canonical numbering.
pub const WEEKDAY_SATURDAY: u8 = 6;

/// A persisted alarm record.
///
/// Mutated only through the alarm store and the alarm manager. The `playlist`
/// and `stream` fields are both optional; when both are present (legacy
/// records) the playlist takes precedence at source-creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    /// Opaque unique id, generated client-side, immutable after creation.
    pub id: String,
    /// Wall-clock firing time.
    pub time: AlarmTime,
    /// Repeat weekdays (0 = Sunday .. 6 = Saturday); empty means one-shot.
    #[serde(default)]
    pub repeat_days: BTreeSet<u8>,
    /// Disabled alarms are never evaluated by either trigger path.
    pub enabled: bool,
    /// Playlist sound source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<PlaylistSpec>,
    /// Stream sound source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamSpec>,
    /// Whether the snooze action is offered when this alarm fires.
    #[serde(default)]
    pub snooze_enabled: bool,
    /// Snooze deferral length in minutes.
    #[serde(default = "default_snooze_interval_minutes")]
    pub snooze_interval_minutes: u32,
    /// When set, the alarm is pending a snooze re-fire and the normal
    /// time-of-day match is bypassed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snooze_until: Option<DateTime<Local>>,
}

fn default_snooze_interval_minutes() -> u32 {
    5
}

impl Alarm {
    /// Creates a new enabled alarm with a fresh id and no sound source.
    #[must_use]
    pub fn new(time: AlarmTime) -> Self {
        Self {
            id: generate_alarm_id(),
            time,
            repeat_days: BTreeSet::new(),
            enabled: true,
            playlist: None,
            stream: None,
            snooze_enabled: true,
            snooze_interval_minutes: default_snooze_interval_minutes(),
            snooze_until: None,
        }
    }

    /// Returns true if this alarm has no repeat days (fires once).
    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        self.repeat_days.is_empty()
    }

    /// Returns true if at least one sound source is configured.
    #[must_use]
    pub fn has_sound_source(&self) -> bool {
        self.playlist.is_some() || self.stream.is_some()
    }

    /// Returns the display name of the configured sound source, playlist
    /// taking precedence over stream for legacy records carrying both.
    #[must_use]
    pub fn sound_source_name(&self) -> Option<&str> {
        self.playlist
            .as_ref()
            .map(|p| p.name.as_str())
            .or_else(|| self.stream.as_ref().map(|s| s.name.as_str()))
    }

    /// Validates the record for persistence.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && !self.has_sound_source() {
            return Err("有効なアラームにはサウンドソースが必要です".to_string());
        }
        if let Some(day) = self.repeat_days.iter().find(|d| **d > WEEKDAY_SATURDAY) {
            return Err(format!("曜日は0-6の範囲で指定してください: {day}"));
        }
        if self.snooze_interval_minutes < 1 || self.snooze_interval_minutes > 60 {
            return Err("スヌーズ間隔は1-60分の範囲で指定してください".to_string());
        }
        Ok(())
    }
}

/// Generates a client-side alarm id: unix millis plus a random suffix.
#[must_use]
pub fn generate_alarm_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", millis, &suffix[..8])
}

// ============================================================================
// IPC Types
// ============================================================================

/// Parameters for the add command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddParams {
    /// Alarm time as "HH:MM"
    pub time: String,
    /// Repeat weekdays (0 = Sunday .. 6 = Saturday)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repeat_days: Vec<u8>,
    /// Stream URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    /// Stream display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_name: Option<String>,
    /// Playlist URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_uri: Option<String>,
    /// Playlist display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,
    /// Snooze interval in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snooze_interval_minutes: Option<u32>,
    /// Whether the snooze action is offered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snooze_enabled: Option<bool>,
}

/// Parameters for the preview command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewParams {
    /// Stream URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
    /// Stream display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_name: Option<String>,
    /// Playlist URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_uri: Option<String>,
    /// Playlist display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist_name: Option<String>,
}

/// IPC request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Create a new alarm
    Add {
        /// Alarm parameters
        #[serde(flatten)]
        params: AddParams,
    },
    /// List all alarms
    List,
    /// Enable an alarm
    Enable {
        /// Alarm id
        id: String,
    },
    /// Disable an alarm
    Disable {
        /// Alarm id
        id: String,
    },
    /// Delete an alarm
    Delete {
        /// Alarm id
        id: String,
    },
    /// Snooze the currently ringing alarm
    Snooze {
        /// Deferral in minutes; defaults to the alarm's own interval
        #[serde(skip_serializing_if = "Option::is_none")]
        minutes: Option<u32>,
    },
    /// Stop the currently ringing alarm
    Stop,
    /// Query the engine status
    Status,
    /// Start preview playback of a sound source
    Preview {
        /// Preview parameters
        #[serde(flatten)]
        params: PreviewParams,
    },
    /// Stop preview playback
    PreviewStop,
}

/// Summary of one alarm for list/status responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmSummary {
    /// Alarm id
    pub id: String,
    /// Alarm time as "HH:MM"
    pub time: String,
    /// Repeat weekdays
    pub repeat_days: Vec<u8>,
    /// Whether the alarm is enabled
    pub enabled: bool,
    /// Sound source display name, if configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_name: Option<String>,
    /// Pending snooze deadline, if snoozed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snooze_until: Option<String>,
}

impl AlarmSummary {
    /// Creates a summary from an alarm record.
    #[must_use]
    pub fn from_alarm(alarm: &Alarm) -> Self {
        Self {
            id: alarm.id.clone(),
            time: alarm.time.to_string(),
            repeat_days: alarm.repeat_days.iter().copied().collect(),
            enabled: alarm.enabled,
            sound_name: alarm.sound_source_name().map(String::from),
            snooze_until: alarm.snooze_until.map(|t| t.format("%H:%M").to_string()),
        }
    }
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    /// Engine state ("idle", "triggered", "snoozed")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Name of the source currently playing for an alarm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_source: Option<String>,
    /// Alarm id the engine is currently acting on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_id: Option<String>,
    /// Alarm summaries (list/status commands)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarms: Option<Vec<AlarmSummary>>,
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
