//! Notification subsystem error types.

use thiserror::Error;

/// Errors that can occur while scheduling notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The event channel receiver was dropped; the daemon is shutting down.
    #[error("通知チャネルが閉じています")]
    ChannelClosed,

    /// The requested trigger time could not be scheduled.
    #[error("通知をスケジュールできません: {0}")]
    Schedule(String),
}
