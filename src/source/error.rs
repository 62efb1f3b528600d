//! Audio source error types.

use thiserror::Error;

use crate::audio::AudioError;
use crate::service::ServiceError;

/// Errors that can occur while starting or running an audio source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The audio session reported a failure.
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// The music service reported a failure.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The remote player never became ready within the retry budget.
    #[error("プレイリスト「{name}」を開始できませんでした（{attempts}回試行）")]
    PlaylistUnavailable {
        /// Playlist display name.
        name: String,
        /// Number of attempts made.
        attempts: u32,
    },
}

impl SourceError {
    /// Returns true if this failure should be surfaced to the user as a
    /// one-shot notice (retries already exhausted).
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::PlaylistUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_unavailable_display() {
        let err = SourceError::PlaylistUnavailable {
            name: "Wake Up Mix".to_string(),
            attempts: 3,
        };
        assert!(err.to_string().contains("Wake Up Mix"));
        assert!(err.to_string().contains('3'));
        assert!(err.is_user_visible());
    }

    #[test]
    fn test_wrapped_audio_error_not_user_visible() {
        let err = SourceError::Audio(AudioError::NotLoaded);
        assert!(!err.is_user_visible());
    }
}
