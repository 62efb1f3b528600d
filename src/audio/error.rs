//! Audio session error types.

use thiserror::Error;

/// Errors that can occur while driving the shared audio session.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Audio output device is not available.
    #[error("オーディオデバイスが利用できません: {0}")]
    DeviceNotAvailable(String),

    /// The stream URL could not be parsed.
    #[error("ストリームURLが不正です: {0}")]
    InvalidUrl(String),

    /// The stream could not be opened.
    #[error("ストリームを開けませんでした: {0}")]
    StreamOpen(String),

    /// The stream audio could not be decoded.
    #[error("ストリームのデコードに失敗しました: {0}")]
    Decode(String),

    /// An operation was issued with no stream loaded.
    #[error("ストリームがロードされていません")]
    NotLoaded,

    /// Generic playback failure.
    #[error("再生エラー: {0}")]
    Playback(String),
}

impl AudioError {
    /// Returns true if this error is expected during teardown
    /// ("already stopped / not loaded") and should be treated as success.
    #[must_use]
    pub fn is_expected_on_stop(&self) -> bool {
        matches!(self, Self::NotLoaded)
    }

    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_))
    }
}
