//! Persistent store error types.

use thiserror::Error;

/// Errors that can occur in the persistent store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying filesystem failure.
    #[error("ストアの読み書きに失敗しました: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded.
    #[error("保存データのデコードに失敗しました ({key}): {source}")]
    Decode {
        /// Store key being read.
        key: String,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded for storage.
    #[error("データのエンコードに失敗しました: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    /// Returns true if this error came from decoding an existing value,
    /// meaning the stored payload is corrupt rather than the disk failing.
    #[must_use]
    pub fn is_corrupt_payload(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
