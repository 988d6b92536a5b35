use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable context.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored document exists but cannot be decoded.
    #[error("stored game `{key}` is corrupted")]
    Corrupted {
        /// Key of the offending document.
        key: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The key cannot address a document (game codes are decimal digits only).
    #[error("invalid storage key `{key}`")]
    InvalidKey {
        /// Rejected key.
        key: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}

/// Reject keys that are not plain game codes before they reach a backend.
pub fn ensure_valid_key(key: &str) -> StorageResult<()> {
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(StorageError::InvalidKey {
            key: key.to_string(),
        })
    }
}
