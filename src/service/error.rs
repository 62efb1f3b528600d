//! Music-service client error types.

use thiserror::Error;

/// Errors reported by the external music-service client.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Transport-level HTTP failure.
    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the request.
    #[error("サービスエラー (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Service-provided message, if any.
        message: String,
    },

    /// No playback device is ready to accept commands. The remote player
    /// may need time to wake; callers retry with backoff.
    #[error("再生デバイスが準備できていません")]
    DeviceNotReady,

    /// No bearer token is available.
    #[error("認証トークンが取得できません: {0}")]
    TokenUnavailable(String),

    /// The response body could not be interpreted.
    #[error("レスポンスの形式が不正です")]
    Parse,
}

impl ServiceError {
    /// Returns true if the remote player was not ready, which is retried
    /// rather than surfaced.
    #[must_use]
    pub fn is_device_not_ready(&self) -> bool {
        matches!(self, Self::DeviceNotReady)
    }

    /// Returns true if this error is expected from the pause endpoint
    /// ("nothing is playing" / endpoint unavailable for this account or
    /// device state) and should be treated as already stopped.
    #[must_use]
    pub fn is_expected_on_pause(&self) -> bool {
        match self {
            Self::DeviceNotReady => true,
            Self::Api { status, .. } => matches!(status, 403 | 404),
            _ => false,
        }
    }
}
