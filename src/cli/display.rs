//! Display utilities for the alarm clock CLI.
//!
//! This module provides formatted output for:
//! - Success messages
//! - Error messages
//! - Status and alarm-list display

use crate::types::{AlarmSummary, IpcResponse};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows a plain success message from the daemon.
    pub fn show_message(response: &IpcResponse) {
        if !response.message.is_empty() {
            println!("{}", response.message);
        }
    }

    /// Shows a success message for alarm creation.
    pub fn show_add_success(response: &IpcResponse) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            if let Some(id) = &data.alarm_id {
                println!("  ID: {}", id);
            }
        }
    }

    /// Shows the alarm list.
    pub fn show_list(response: &IpcResponse) {
        let Some(alarms) = response.data.as_ref().and_then(|d| d.alarms.as_ref()) else {
            println!("アラームはありません");
            return;
        };
        if alarms.is_empty() {
            println!("アラームはありません");
            return;
        }

        println!("アラーム一覧");
        println!("─────────────────────────────");
        for alarm in alarms {
            Self::show_alarm_line(alarm);
        }
    }

    /// Shows the daemon status.
    pub fn show_status(response: &IpcResponse) {
        println!("目覚ましデーモン ステータス");
        println!("─────────────────────────────");

        if let Some(data) = &response.data {
            let state = data.state.as_deref().unwrap_or("unknown");
            let state_display = match state {
                "idle" => "待機中",
                "triggered" => "再生中",
                "snoozed" => "スヌーズ中",
                _ => state,
            };
            println!("状態: {}", state_display);

            if let Some(source) = &data.active_source {
                println!("再生中のソース: {}", source);
            }
            if let Some(alarms) = &data.alarms {
                println!();
                println!("アラーム ({}件):", alarms.len());
                for alarm in alarms {
                    Self::show_alarm_line(alarm);
                }
            }
        }
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    fn show_alarm_line(alarm: &AlarmSummary) {
        let enabled = if alarm.enabled { "●" } else { "○" };
        let days = if alarm.repeat_days.is_empty() {
            "一回のみ".to_string()
        } else {
            alarm
                .repeat_days
                .iter()
                .map(|d| Self::weekday_label(*d))
                .collect::<Vec<_>>()
                .join("")
        };
        let sound = alarm.sound_name.as_deref().unwrap_or("(サウンド未設定)");

        let mut line = format!("{} {}  {}  {}  [{}]", enabled, alarm.time, days, sound, alarm.id);
        if let Some(until) = &alarm.snooze_until {
            line.push_str(&format!("  (スヌーズ: {}まで)", until));
        }
        println!("{}", line);
    }

    fn weekday_label(day: u8) -> &'static str {
        match day {
            0 => "日",
            1 => "月",
            2 => "火",
            3 => "水",
            4 => "木",
            5 => "金",
            6 => "土",
            _ => "?",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
